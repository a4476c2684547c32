use std::sync::{Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::{EventSink, Transport, TransportEvent};

/// In-process transport.
///
/// Records every outbound text message and lets its owner play the remote
/// side: inject inbound text with [`deliver_text`](Self::deliver_text) and
/// end the connection with [`close_from_server`](Self::close_from_server).
/// Events are delivered synchronously on the calling thread.
pub struct MemoryTransport {
    host: String,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    open: bool,
    sink: Option<EventSink>,
    sent: Vec<String>,
    connects: usize,
    fail_next_connect: Option<String>,
    fail_sends: Option<String>,
}

impl MemoryTransport {
    /// Create a closed transport that reports `host` as its target.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// All text messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Drain the recorded outbound messages.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Number of successful `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Make the next `connect` fail with the given reason.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.lock().fail_next_connect = Some(reason.into());
    }

    /// Make every `send_text` fail with the given reason until cleared.
    pub fn fail_sends(&self, reason: Option<String>) {
        self.lock().fail_sends = reason;
    }

    /// Deliver a text message as if it arrived from the remote side.
    ///
    /// Returns `false` when the transport is closed and nothing was delivered.
    pub fn deliver_text(&self, text: impl Into<String>) -> bool {
        let sink = {
            let state = self.lock();
            if !state.open {
                return false;
            }
            state.sink.clone()
        };
        match sink {
            Some(sink) => {
                sink(TransportEvent::Text(text.into()));
                true
            }
            None => false,
        }
    }

    /// Report a transport error to the installed sink.
    pub fn deliver_error(&self, cause: impl Into<String>) -> bool {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink(TransportEvent::Error(cause.into()));
                true
            }
            None => false,
        }
    }

    /// Close the connection from the remote side.
    pub fn close_from_server(&self, code: u16, reason: impl Into<String>) {
        let sink = {
            let mut state = self.lock();
            if !state.open {
                return;
            }
            state.open = false;
            state.sink.take()
        };
        debug!(host = %self.host, code, "memory transport closed by server");
        if let Some(sink) = sink {
            sink(TransportEvent::Closed {
                code: Some(code),
                reason: reason.into(),
                by_server: true,
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Sinks run outside the lock, so a poisoned state is still consistent.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, events: EventSink) -> Result<()> {
        {
            let mut state = self.lock();
            if let Some(reason) = state.fail_next_connect.take() {
                return Err(TransportError::Connect {
                    url: format!("memory://{}", self.host),
                    reason,
                });
            }
            state.open = true;
            state.connects += 1;
            state.sink = Some(events.clone());
        }
        debug!(host = %self.host, "memory transport opened");
        events(TransportEvent::Opened);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let sink = {
            let mut state = self.lock();
            if !state.open {
                return Ok(());
            }
            state.open = false;
            state.sink.take()
        };
        debug!(host = %self.host, "memory transport closed");
        if let Some(sink) = sink {
            sink(TransportEvent::Closed {
                code: Some(1000),
                reason: String::new(),
                by_server: false,
            });
        }
        Ok(())
    }

    fn send_text(&self, text: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if let Some(reason) = &state.fail_sends {
            return Err(TransportError::Send(reason.clone()));
        }
        trace!(len = text.len(), "memory transport send");
        state.sent.push(text.to_string());
        Ok(())
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("host", &self.host)
            .field("open", &self.is_open())
            .finish()
    }
}
