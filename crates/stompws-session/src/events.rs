//! Connection lifecycle notifications.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

/// A change in session connectivity, or a non-fatal problem worth surfacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A CONNECT frame is about to be sent.
    Connecting,
    /// The server answered CONNECTED.
    Connected {
        /// Version the server reported, if any.
        version: Option<String>,
    },
    /// The session left the connected or connecting state.
    Disconnected {
        /// True when the server or the network ended the connection.
        by_server: bool,
    },
    /// The server sent an ERROR frame.
    ProtocolError {
        message: Option<String>,
        body: Option<String>,
    },
    /// The transport reported an I/O failure.
    TransportError(String),
    /// An inbound frame could not be decoded or routed and was dropped.
    InboundDropped(String),
}

/// Observer of [`ConnectionEvent`]s.
pub type ConnectionListener = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Holds at most one connection listener and delivers events to it.
///
/// The listener is cloned out of the lock before it runs, so it may call
/// back into the session or replace itself.
#[derive(Default)]
pub struct EventNotifier {
    listener: Mutex<Option<ConnectionListener>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `listener`, replacing any previous one.
    pub fn set(&self, listener: ConnectionListener) {
        *self.lock() = Some(listener);
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }

    /// Deliver `event` to the current listener, if any.
    pub fn notify(&self, event: &ConnectionEvent) {
        let listener = self.lock().clone();
        match listener {
            Some(listener) => listener(event),
            None => trace!(?event, "no connection listener installed"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ConnectionListener>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("listener", &self.is_set())
            .finish()
    }
}
