//! STOMP commands understood by this client.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// A STOMP frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Connected,
    Disconnect,
    Error,
    Message,
    Receipt,
    Send,
    Subscribe,
    Unsubscribe,
}

impl Command {
    /// All supported commands.
    pub const ALL: [Command; 9] = [
        Command::Connect,
        Command::Connected,
        Command::Disconnect,
        Command::Error,
        Command::Message,
        Command::Receipt,
        Command::Send,
        Command::Subscribe,
        Command::Unsubscribe,
    ];

    /// Canonical wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Disconnect => "DISCONNECT",
            Command::Error => "ERROR",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
        }
    }

    /// Returns true if frames with this command normally carry a body.
    pub fn carries_body(self) -> bool {
        matches!(self, Command::Send | Command::Message | Command::Error)
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.as_str() == token)
            .ok_or_else(|| FrameError::UnknownCommand(token.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_canonical_token() {
        for command in Command::ALL {
            assert_eq!(command.as_str().parse::<Command>().unwrap(), command);
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "BEGIN".parse::<Command>().unwrap_err();
        assert_eq!(err, FrameError::UnknownCommand("BEGIN".to_string()));
    }

    #[test]
    fn tokens_are_case_sensitive() {
        assert!("send".parse::<Command>().is_err());
    }

    #[test]
    fn body_carrying_commands() {
        assert!(Command::Send.carries_body());
        assert!(Command::Message.carries_body());
        assert!(Command::Error.carries_body());
        assert!(!Command::Connect.carries_body());
        assert!(!Command::Subscribe.carries_body());
    }

    #[test]
    fn display_matches_wire_token() {
        assert_eq!(Command::Unsubscribe.to_string(), "UNSUBSCRIBE");
    }
}
