use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Something that happened on the transport, delivered asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and ready to carry text.
    Opened,
    /// A complete text message arrived from the remote side.
    Text(String),
    /// The connection closed.
    Closed {
        /// Close code, when the remote side sent one.
        code: Option<u16>,
        /// Close reason; empty when none was given.
        reason: String,
        /// True when the remote side (or the network) ended the connection.
        by_server: bool,
    },
    /// A non-fatal error was observed on the connection.
    Error(String),
}

/// Callback receiving transport events.
///
/// Implementations may invoke the sink from their own I/O thread, so it
/// must be `Send + Sync`. The sink is never invoked while a transport
/// lock is held; it may call back into the transport.
pub type EventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// A full-duplex text-message connection.
///
/// This is the complete surface a STOMP session consumes. Implementations
/// own socket I/O, framing and any handshake below STOMP.
pub trait Transport: Send + Sync {
    /// Open the connection and install the sink for inbound events.
    ///
    /// Blocks until the transport-level handshake has finished. A
    /// successful connect is followed by [`TransportEvent::Opened`].
    fn connect(&self, events: EventSink) -> Result<()>;

    /// Close the connection. Closing a closed transport is a no-op.
    fn disconnect(&self) -> Result<()>;

    /// Send one text message.
    fn send_text(&self, text: &str) -> Result<()>;

    /// Target host, used for the STOMP `host` header.
    fn host(&self) -> &str;

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("host", &self.host())
            .field("open", &self.is_open())
            .finish()
    }
}
