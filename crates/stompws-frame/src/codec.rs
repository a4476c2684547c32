use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::command::Command;
use crate::error::{FrameError, Result};
use crate::header;

/// Frame terminator.
pub const NUL: char = '\0';

/// Header map. Ordered so that serialization is deterministic.
pub type Headers = BTreeMap<String, String>;

/// A STOMP frame: command, headers and an optional body.
///
/// Frames are built once and not mutated afterwards; the builder methods
/// consume and return the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    headers: Headers,
    body: Option<String>,
}

impl Frame {
    /// Create a frame with no headers and no body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set several headers; later entries replace earlier ones.
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// CONNECT frame for the given protocol version and virtual host.
    pub fn connect(accept_version: &str, host: &str) -> Self {
        Frame::new(Command::Connect)
            .with_header(header::ACCEPT_VERSION, accept_version)
            .with_header(header::HOST, host)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    /// SEND frame with a body.
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .with_header(header::DESTINATION, destination)
            .with_body(body)
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .with_header(header::ID, id)
            .with_header(header::DESTINATION, destination)
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).with_header(header::ID, id)
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Value of a single header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Length of the encoded frame in bytes, NUL included.
    pub fn wire_size(&self) -> usize {
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + 1 + value.len() + 1)
            .sum();
        self.command.as_str().len() + 1 + headers + 1 + self.body.as_ref().map_or(0, String::len) + 1
    }
}

/// Writes the exact wire text, NUL terminator included.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command.as_str())?;
        f.write_str("\n")?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}:{value}")?;
        }
        f.write_str("\n")?;
        if let Some(body) = &self.body {
            f.write_str(body)?;
        }
        write!(f, "{NUL}")
    }
}

/// Encode a frame into its text wire format.
///
/// Wire format:
/// ```text
/// COMMAND\n
/// name:value\n      (one line per header, sorted by name)
/// \n
/// body\0
/// ```
pub fn encode_frame(frame: &Frame) -> String {
    let mut out = String::with_capacity(frame.wire_size());
    // Writing into a String cannot fail.
    let _ = fmt::Write::write_fmt(&mut out, format_args!("{frame}"));
    out
}

/// Decode one frame from a transport text message.
///
/// Leading blank lines are skipped. A frame whose command line ends in
/// CRLF is read with CRLF line endings throughout; otherwise a `\r` is
/// kept as part of the line. A header line is split on its first `:`;
/// when a header repeats, the first occurrence wins. The body runs up to
/// the first NUL; anything after it is ignored.
pub fn decode_frame(text: &str) -> Result<Frame> {
    let content = text.trim_start_matches(['\r', '\n']);
    if content.is_empty() {
        return Err(FrameError::MalformedFrame("empty frame".to_string()));
    }

    let (command_line, mut rest) = content.split_once('\n').unwrap_or((content, ""));
    let crlf = command_line.ends_with('\r');
    let command_line = line_content(command_line, crlf);
    if command_line.contains(NUL) {
        return Err(FrameError::MalformedFrame(
            "frame ends before its header block".to_string(),
        ));
    }
    let command: Command = command_line.parse()?;

    let mut headers = Headers::new();
    let body_section = loop {
        let Some((line, tail)) = rest.split_once('\n') else {
            return Err(FrameError::MalformedFrame(
                "missing blank line after headers".to_string(),
            ));
        };
        let line = line_content(line, crlf);
        if line.is_empty() {
            break tail;
        }
        if line.contains(NUL) {
            return Err(FrameError::MalformedFrame(
                "frame ends inside its header block".to_string(),
            ));
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            FrameError::MalformedFrame(format!("header line without ':': {line:?}"))
        })?;
        if name.is_empty() {
            return Err(FrameError::MalformedFrame("empty header name".to_string()));
        }
        if headers.contains_key(name) {
            trace!(name, "ignoring repeated header");
        } else {
            headers.insert(name.to_string(), value.to_string());
        }
        rest = tail;
    };

    let (body, trailing) = body_section.split_once(NUL).ok_or_else(|| {
        FrameError::MalformedFrame("missing NUL terminator".to_string())
    })?;
    if !trailing.trim_matches(['\r', '\n']).is_empty() {
        trace!(len = trailing.len(), "ignoring data after frame terminator");
    }

    let body = if command.carries_body() || !body.is_empty() {
        Some(body.to_string())
    } else {
        None
    };

    Ok(Frame {
        command,
        headers,
        body,
    })
}

/// Returns true if the message is a heart-beat (nothing but line endings).
pub fn is_heartbeat(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c == '\n' || c == '\r')
}

fn line_content(line: &str, crlf: bool) -> &str {
    if crlf {
        line.strip_suffix('\r').unwrap_or(line)
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_encode_send_frame_exact_text() {
        let frame = Frame::send("/app/hello", "{\"name\":\"Jack\"}");
        assert_eq!(
            encode_frame(&frame),
            "SEND\ndestination:/app/hello\n\n{\"name\":\"Jack\"}\0"
        );
    }

    #[test]
    fn test_encode_without_body_writes_empty_body() {
        let frame = Frame::unsubscribe("7");
        assert_eq!(encode_frame(&frame), "UNSUBSCRIBE\nid:7\n\n\0");
    }

    #[test]
    fn test_encode_headers_sorted_by_name() {
        let frame = Frame::connect("1.2", "localhost");
        assert_eq!(
            encode_frame(&frame),
            "CONNECT\naccept-version:1.2\nhost:localhost\n\n\0"
        );
    }

    #[test]
    fn test_wire_size_matches_encoding() {
        let frame = Frame::send("/queue/a", "payload").with_header("receipt", "r-1");
        assert_eq!(frame.wire_size(), encode_frame(&frame).len());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let frames = [
            Frame::connect("1.2", "broker.local"),
            Frame::send("/topic/a", "line one\nline two").with_header("content-type", "text/plain"),
            Frame::send("/topic/empty", ""),
            Frame::subscribe("42", "/topic/a"),
            Frame::new(Command::Message)
                .with_header("subscription", "42")
                .with_header("message-id", "m-1")
                .with_body("hi"),
            Frame::new(Command::Connected).with_header("version", "1.2"),
            Frame::disconnect(),
        ];

        for frame in frames {
            let decoded = decode_frame(&encode_frame(&frame)).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_decode_header_value_keeps_colons() {
        let frame = decode_frame("MESSAGE\nsubscription:1\ntime:2024-01-01T00:00:00Z\n\nx\0").unwrap();
        assert_eq!(frame.header("time"), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_decode_connected() {
        let frame = decode_frame("CONNECTED\nversion:1.2\n\n\0").unwrap();
        assert_eq!(frame.command(), Command::Connected);
        assert_eq!(frame.header("version"), Some("1.2"));
        assert_eq!(frame.body(), None);
    }

    #[test]
    fn test_decode_skips_leading_blank_lines() {
        let frame = decode_frame("\n\r\n\nRECEIPT\nreceipt-id:77\n\n\0").unwrap();
        assert_eq!(frame.command(), Command::Receipt);
        assert_eq!(frame.header("receipt-id"), Some("77"));
    }

    #[test]
    fn test_decode_accepts_crlf() {
        let frame = decode_frame("MESSAGE\r\nsubscription:3\r\n\r\nhello\0").unwrap();
        assert_eq!(frame.header("subscription"), Some("3"));
        assert_eq!(frame.body(), Some("hello"));
    }

    #[test]
    fn test_header_value_ending_in_cr_roundtrips() {
        let frame = Frame::new(Command::Message)
            .with_header("k", "v\r")
            .with_body("b");
        let decoded = decode_frame(&encode_frame(&frame)).unwrap();
        assert_eq!(decoded.header("k"), Some("v\r"));
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_decode_crlf_frame_strips_every_line_ending() {
        let frame = decode_frame("SEND\r\ndestination:/a\r\nreceipt:9\r\n\r\nbody\0").unwrap();
        assert_eq!(frame.header("destination"), Some("/a"));
        assert_eq!(frame.header("receipt"), Some("9"));
        assert_eq!(frame.body(), Some("body"));
    }

    #[test]
    fn test_decode_multiline_body() {
        let frame = decode_frame("MESSAGE\nsubscription:1\n\na\n\nb\n\0").unwrap();
        assert_eq!(frame.body(), Some("a\n\nb\n"));
    }

    #[test]
    fn test_decode_ignores_trailing_eols() {
        let frame = decode_frame("MESSAGE\nsubscription:1\n\nbody\0\n\n").unwrap();
        assert_eq!(frame.body(), Some("body"));
    }

    #[test]
    fn test_decode_repeated_header_first_wins() {
        let frame = decode_frame("MESSAGE\nfoo:first\nfoo:second\n\n\0").unwrap();
        assert_eq!(frame.header("foo"), Some("first"));
    }

    #[test]
    fn test_decode_body_for_body_commands_is_present_even_if_empty() {
        let frame = decode_frame("ERROR\nmessage:bad\n\n\0").unwrap();
        assert_eq!(frame.body(), Some(""));
    }

    #[test]
    fn test_decode_unknown_command() {
        let err = decode_frame("BEGIN\ntransaction:tx1\n\n\0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
    }

    #[test]
    fn test_decode_missing_header_terminator() {
        let err = decode_frame("SEND\ndestination:/a\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFrame);
    }

    #[test]
    fn test_decode_missing_nul() {
        let err = decode_frame("SEND\ndestination:/a\n\nbody").unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame(ref m) if m.contains("NUL")));
    }

    #[test]
    fn test_decode_header_without_colon() {
        let err = decode_frame("SEND\ndestination\n\n\0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFrame);
    }

    #[test]
    fn test_decode_empty_input() {
        assert_eq!(decode_frame("").unwrap_err().kind(), ErrorKind::MalformedFrame);
        assert_eq!(decode_frame("\n\n").unwrap_err().kind(), ErrorKind::MalformedFrame);
    }

    #[test]
    fn test_decode_nul_inside_header_block() {
        let err = decode_frame("CONNECTED\0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFrame);
        let err = decode_frame("CONNECTED\nversion:1.2\0\n\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFrame);
    }

    #[test]
    fn test_heartbeat_detection() {
        assert!(is_heartbeat("\n"));
        assert!(is_heartbeat("\r\n\r\n"));
        assert!(!is_heartbeat(""));
        assert!(!is_heartbeat("CONNECTED\n\n\0"));
    }

    #[test]
    fn test_builder_overwrites_header() {
        let frame = Frame::new(Command::Send)
            .with_headers([("destination", "/a"), ("priority", "4")])
            .with_header("destination", "/b");
        assert_eq!(frame.header("destination"), Some("/b"));
        assert_eq!(frame.headers().len(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn any_command() -> impl Strategy<Value = Command> {
            proptest::sample::select(Command::ALL.to_vec())
        }

        fn any_frame() -> impl Strategy<Value = Frame> {
            (
                any_command(),
                proptest::collection::btree_map("[a-z][a-z0-9-]{0,15}", "[^\n\x00]{0,24}", 0..6),
                "[^\x00]{0,64}",
            )
                .prop_map(|(command, headers, body)| {
                    let frame = Frame::new(command).with_headers(headers);
                    if command.carries_body() || !body.is_empty() {
                        frame.with_body(body)
                    } else {
                        frame
                    }
                })
        }

        proptest! {
            #[test]
            fn decode_inverts_encode(frame in any_frame()) {
                let decoded = decode_frame(&encode_frame(&frame)).unwrap();
                prop_assert_eq!(decoded, frame);
            }

            #[test]
            fn wire_size_is_exact(frame in any_frame()) {
                prop_assert_eq!(frame.wire_size(), encode_frame(&frame).len());
            }
        }
    }
}
