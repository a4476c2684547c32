use std::sync::Arc;

use stompws_transport::{WebSocketConfig, WebSocketTransport};
use tracing::info;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;

/// Open a WebSocket to `url` and complete the STOMP handshake.
pub fn connect(url: &str) -> Result<Session> {
    connect_with_config(url, SessionConfig::default(), WebSocketConfig::default())
}

/// Connect with explicit session and transport configuration.
///
/// Blocks until the server answers CONNECTED or `connect_timeout` expires.
pub fn connect_with_config(
    url: &str,
    session_config: SessionConfig,
    websocket_config: WebSocketConfig,
) -> Result<Session> {
    let transport = Arc::new(WebSocketTransport::with_config(url, websocket_config)?);
    let session = Session::with_config(transport, session_config)?;
    session.connect_and_wait()?;
    info!(url, version = ?session.server_version(), "connected");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use stompws_transport::TransportError;

    use super::*;
    use crate::error::SessionError;

    #[test]
    fn rejects_invalid_url() {
        let err = connect("http://localhost/stomp").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn reports_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(&format!("ws://{addr}/stomp")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Connect { .. })
        ));
    }

    #[test]
    fn rejects_invalid_session_config() {
        let config = SessionConfig {
            accept_version: "latest".to_string(),
            ..SessionConfig::default()
        };
        let err =
            connect_with_config("ws://localhost:1/stomp", config, WebSocketConfig::default())
                .unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfig(_)));
    }
}
