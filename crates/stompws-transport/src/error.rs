/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the connection.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The target URL could not be used by this transport.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The operation requires an open connection.
    #[error("transport is not open")]
    NotOpen,

    /// A text message could not be handed to the connection.
    #[error("send failed: {0}")]
    Send(String),

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
