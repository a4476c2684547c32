use crate::registry::SubscriptionId;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] stompws_transport::TransportError),

    /// An inbound message could not be decoded.
    #[error("frame error: {0}")]
    Frame(#[from] stompws_frame::FrameError),

    /// The operation needs a CONNECTED session.
    #[error("session is not connected")]
    NotConnected,

    /// A MESSAGE frame named a subscription with no registered consumer.
    #[error("no consumer registered for subscription {0}")]
    UnknownSubscription(SubscriptionId),

    /// A required header is absent.
    #[error("missing '{0}' header")]
    MissingHeader(&'static str),

    /// The `subscription` header of a MESSAGE frame is not a valid id.
    #[error("invalid subscription id {0:?}")]
    InvalidSubscriptionId(String),

    /// The STOMP handshake did not complete.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Waiting for the handshake timed out.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration values are inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
