use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, trace, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use crate::error::{Result, TransportError};
use crate::traits::{EventSink, Transport, TransportEvent};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Configuration for the WebSocket transport.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Read timeout slice used by the I/O thread between outbound drains.
    ///
    /// This bounds the latency of an outbound message while the connection
    /// is otherwise idle.
    pub poll_interval: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Blocking WebSocket transport.
///
/// `connect` performs the HTTP upgrade on the calling thread, then hands
/// the socket to a dedicated I/O thread. That thread is the only owner of
/// the socket: it writes queued outbound text and delivers inbound text to
/// the event sink. Only `ws://` URLs are supported.
pub struct WebSocketTransport {
    url: Url,
    host: String,
    config: WebSocketConfig,
    connection: Mutex<Option<Connection>>,
}

struct Connection {
    outbound: Sender<Outbound>,
    open: Arc<AtomicBool>,
}

enum Outbound {
    Text(String),
    Close,
}

impl WebSocketTransport {
    /// Create a transport for a `ws://` URL with default configuration.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, WebSocketConfig::default())
    }

    /// Create a transport with explicit configuration.
    pub fn with_config(url: &str, config: WebSocketConfig) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "ws" {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme '{}' (expected 'ws')",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl(format!("{url} has no host")))?
            .to_string();

        Ok(Self {
            url,
            host,
            config,
            connection: Mutex::new(None),
        })
    }

    /// The target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, events: EventSink) -> Result<()> {
        let mut connection = self.lock();
        if let Some(existing) = connection.as_ref() {
            if existing.open.load(Ordering::Acquire) {
                debug!(url = %self.url, "websocket already open");
                return Ok(());
            }
        }

        let (mut socket, response) =
            tungstenite::connect(self.url.as_str()).map_err(|e| TransportError::Connect {
                url: self.url.to_string(),
                reason: e.to_string(),
            })?;
        match socket.get_mut() {
            MaybeTlsStream::Plain(stream) => {
                stream.set_read_timeout(Some(self.config.poll_interval))?
            }
            _ => {
                return Err(TransportError::InvalidUrl(
                    "only plain ws:// streams are supported".to_string(),
                ))
            }
        }
        info!(url = %self.url, status = %response.status(), "websocket connected");

        let (outbound, queue) = mpsc::channel();
        let open = Arc::new(AtomicBool::new(true));
        let thread_open = Arc::clone(&open);
        let thread_events = Arc::clone(&events);
        std::thread::Builder::new()
            .name("stompws-io".to_string())
            .spawn(move || run_io_loop(socket, queue, thread_events, thread_open))?;

        *connection = Some(Connection { outbound, open });
        drop(connection);

        events(TransportEvent::Opened);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let connection = self.lock().take();
        if let Some(connection) = connection {
            if connection.open.swap(false, Ordering::AcqRel) {
                debug!(url = %self.url, "closing websocket");
                // The I/O thread may already be gone; nothing left to close then.
                let _ = connection.outbound.send(Outbound::Close);
            }
        }
        Ok(())
    }

    fn send_text(&self, text: &str) -> Result<()> {
        let connection = self.lock();
        let connection = connection.as_ref().ok_or(TransportError::NotOpen)?;
        if !connection.open.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        connection
            .outbound
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| TransportError::Send("websocket I/O thread has stopped".to_string()))
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn is_open(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|connection| connection.open.load(Ordering::Acquire))
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url.as_str())
            .field("config", &self.config)
            .finish()
    }
}

fn run_io_loop(
    mut socket: Socket,
    queue: Receiver<Outbound>,
    events: EventSink,
    open: Arc<AtomicBool>,
) {
    let mut closing = false;
    let mut close_code = None;
    let mut close_reason = String::new();

    let failure = loop {
        if let Err(err) = drain_outbound(&mut socket, &queue, &mut closing) {
            break Some(err);
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                trace!(len = text.len(), "websocket text received");
                events(TransportEvent::Text(text));
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => events(TransportEvent::Text(text)),
                Err(_) => debug!("ignoring non-UTF-8 binary message"),
            },
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    close_code = Some(u16::from(frame.code));
                    close_reason = frame.reason.into_owned();
                }
                debug!(code = ?close_code, "websocket close frame received");
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                if let Err(err) = socket.flush() {
                    if !is_retryable(&err) {
                        break Some(err);
                    }
                }
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                break None;
            }
            Err(err) => break Some(err),
        }
    };

    open.store(false, Ordering::Release);

    if let Some(err) = &failure {
        warn!(error = %err, "websocket I/O failed");
        events(TransportEvent::Error(err.to_string()));
        if close_reason.is_empty() {
            close_reason = err.to_string();
        }
    }
    debug!(code = ?close_code, by_server = !closing, "websocket closed");
    events(TransportEvent::Closed {
        code: close_code,
        reason: close_reason,
        by_server: !closing,
    });
}

fn drain_outbound(
    socket: &mut Socket,
    queue: &Receiver<Outbound>,
    closing: &mut bool,
) -> std::result::Result<(), tungstenite::Error> {
    loop {
        match queue.try_recv() {
            Ok(Outbound::Text(text)) => {
                if *closing {
                    continue;
                }
                if let Err(err) = socket.send(Message::Text(text)) {
                    if !is_retryable(&err) {
                        return Err(err);
                    }
                }
            }
            Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                if !*closing {
                    *closing = true;
                    if let Err(err) = socket.close(None) {
                        if !is_retryable(&err) {
                            return Err(err);
                        }
                    }
                }
                return Ok(());
            }
            Err(TryRecvError::Empty) => return Ok(()),
        }
    }
}

fn is_retryable(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::Io(io)
            if io.kind() == ErrorKind::WouldBlock || io.kind() == ErrorKind::TimedOut
    )
}
