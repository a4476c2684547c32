use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::Duration;

use stompws_frame::{decode_frame, encode_frame, header, is_heartbeat, Command, Frame};
use stompws_transport::{EventSink, Transport, TransportEvent};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{ConnectionEvent, ConnectionListener, EventNotifier};
use crate::handshake;
use crate::registry::{SubscriptionId, SubscriptionRegistry};

/// Connection status of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::Disconnected => "DISCONNECTED",
            SessionStatus::Connecting => "CONNECTING",
            SessionStatus::Connected => "CONNECTED",
        })
    }
}

/// Returned by [`Session::subscribe`]; pass it to [`Session::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    destination: String,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// A STOMP client session bound to one transport.
///
/// `Session` is a cheap handle: clones share the same connection, status
/// and subscriptions. All operations may be called from any thread.
///
/// Inbound frames arrive on the transport's delivery context and are
/// processed there. Message consumers and the connection listener are
/// invoked without any session lock held, so they may call back into the
/// session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    state: Mutex<State>,
    status_changed: Condvar,
    notifier: EventNotifier,
    #[cfg(feature = "async")]
    status_tx: tokio::sync::watch::Sender<SessionStatus>,
}

struct State {
    status: SessionStatus,
    registry: SubscriptionRegistry,
    server_version: Option<String>,
    /// Why the last handshake ended without reaching CONNECTED.
    handshake_error: Option<String>,
    /// Bumped each time the transport is reopened. Events from a sink
    /// installed for an older connection are discarded.
    generation: u64,
}

impl Session {
    /// Create a session over `transport` with default configuration.
    pub fn new<T: Transport + 'static>(transport: Arc<T>) -> Self {
        Self::build(transport, SessionConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config<T: Transport + 'static>(
        transport: Arc<T>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(transport, config))
    }

    fn build(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        #[cfg(feature = "async")]
        let (status_tx, _) = tokio::sync::watch::channel(SessionStatus::Disconnected);

        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(State {
                    status: SessionStatus::Disconnected,
                    registry: SubscriptionRegistry::new(),
                    server_version: None,
                    handshake_error: None,
                    generation: 0,
                }),
                status_changed: Condvar::new(),
                notifier: EventNotifier::new(),
                #[cfg(feature = "async")]
                status_tx,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock_state().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    /// Version reported by the server in CONNECTED, once connected.
    pub fn server_version(&self) -> Option<String> {
        self.inner.lock_state().server_version.clone()
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock_state().registry.len()
    }

    /// Install the connection listener, replacing any previous one.
    pub fn set_connection_listener<F>(&self, listener: F)
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let listener: ConnectionListener = Arc::new(listener);
        self.inner.notifier.set(listener);
    }

    pub fn clear_connection_listener(&self) {
        self.inner.notifier.clear();
    }

    /// Open the transport if needed and send CONNECT.
    ///
    /// Returns once CONNECT is written; the session becomes CONNECTED when
    /// the server answers. Calling this while CONNECTING or CONNECTED does
    /// nothing.
    pub fn connect(&self) -> Result<()> {
        let transport = &self.inner.transport;
        let reopen = {
            let mut state = self.inner.lock_state();
            if state.status != SessionStatus::Disconnected {
                debug!(status = %state.status, "connect ignored, session already active");
                return Ok(());
            }
            state.status = SessionStatus::Connecting;
            state.server_version = None;
            state.handshake_error = None;
            self.inner.publish(&state);
            if transport.is_open() {
                None
            } else {
                state.generation += 1;
                Some(state.generation)
            }
        };
        self.inner.notifier.notify(&ConnectionEvent::Connecting);

        if let Some(generation) = reopen {
            debug!(host = transport.host(), generation, "opening transport");
            if let Err(err) = transport.connect(self.event_sink(generation)) {
                warn!(error = %err, "transport connect failed");
                self.abort_handshake(err.to_string());
                return Err(err.into());
            }
        }

        let frame = handshake::connect_frame(&self.inner.config, transport.host());
        if let Err(err) = self.write_frame(&frame) {
            self.abort_handshake(err.to_string());
            let _ = transport.disconnect();
            return Err(err);
        }
        debug!(accept_version = %self.inner.config.accept_version, "CONNECT sent");
        Ok(())
    }

    /// [`connect`](Self::connect), then block until CONNECTED.
    ///
    /// The wait is bounded by `connect_timeout` from the config. On timeout
    /// the session is disconnected before the error is returned.
    pub fn connect_and_wait(&self) -> Result<()> {
        self.connect()?;
        match self.wait_connected(self.inner.config.connect_timeout) {
            Err(SessionError::Timeout(timeout)) => {
                warn!(?timeout, "no CONNECTED frame before timeout");
                let _ = self.disconnect();
                Err(SessionError::Timeout(timeout))
            }
            other => other,
        }
    }

    /// Block until a pending handshake finishes.
    ///
    /// Returns immediately with `NotConnected` if no handshake was started.
    pub fn wait_connected(&self, timeout: Option<Duration>) -> Result<()> {
        let state = self.inner.lock_state();
        let connecting = |state: &mut State| state.status == SessionStatus::Connecting;
        let state = match timeout {
            Some(timeout) => {
                let (state, _) = self
                    .inner
                    .status_changed
                    .wait_timeout_while(state, timeout, connecting)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if state.status == SessionStatus::Connecting {
                    return Err(SessionError::Timeout(timeout));
                }
                state
            }
            None => self
                .inner
                .status_changed
                .wait_while(state, connecting)
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        };
        handshake_outcome(&state)
    }

    /// Async counterpart of [`wait_connected`](Self::wait_connected).
    #[cfg(feature = "async")]
    pub async fn wait_connected_async(&self, timeout: Duration) -> Result<()> {
        let mut rx = self.inner.status_tx.subscribe();
        let settled = async {
            loop {
                let status = *rx.borrow_and_update();
                if status != SessionStatus::Connecting {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(timeout, settled)
            .await
            .map_err(|_| SessionError::Timeout(timeout))?;
        handshake_outcome(&self.inner.lock_state())
    }

    /// Leave the session and close the transport.
    ///
    /// Sends DISCONNECT if the session was CONNECTED, drops every
    /// subscription and notifies the listener. Idempotent.
    pub fn disconnect(&self) -> Result<()> {
        let (previous, dropped) = {
            let mut state = self.inner.lock_state();
            let previous = state.status;
            let mut dropped = 0;
            if previous != SessionStatus::Disconnected {
                state.status = SessionStatus::Disconnected;
                state.server_version = None;
                dropped = state.registry.clear();
                self.inner.publish(&state);
            }
            (previous, dropped)
        };

        if previous == SessionStatus::Connected {
            if let Err(err) = self.write_frame(&Frame::disconnect()) {
                debug!(error = %err, "DISCONNECT frame not sent");
            }
        }
        let closed = self.inner.transport.disconnect();

        if previous != SessionStatus::Disconnected {
            info!(subscriptions = dropped, "STOMP session closed");
            self.inner
                .notifier
                .notify(&ConnectionEvent::Disconnected { by_server: false });
        }
        closed.map_err(Into::into)
    }

    /// Send `body` to `destination`.
    pub fn send(&self, destination: &str, body: impl Into<String>) -> Result<()> {
        self.send_with_headers(destination, body, std::iter::empty::<(String, String)>())
    }

    /// Send with extra headers.
    ///
    /// Configured default headers are applied first, then `headers`; the
    /// `destination` header always wins.
    pub fn send_with_headers<K, V>(
        &self,
        destination: &str,
        body: impl Into<String>,
        headers: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.ensure_connected()?;
        let frame = Frame::new(Command::Send)
            .with_headers(&self.inner.config.default_headers)
            .with_headers(headers)
            .with_header(header::DESTINATION, destination)
            .with_body(body);
        self.write_frame(&frame)?;
        debug!(destination, "message sent");
        Ok(())
    }

    /// Subscribe `consumer` to `destination`.
    ///
    /// The subscription is registered before SUBSCRIBE is written, so a
    /// MESSAGE that races the return of this call still reaches `consumer`.
    pub fn subscribe<F>(&self, destination: &str, consumer: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        let id = {
            let mut state = self.inner.lock_state();
            if state.status != SessionStatus::Connected {
                return Err(SessionError::NotConnected);
            }
            state.registry.add(destination, Arc::new(consumer))
        };

        let frame = Frame::subscribe(&id.to_string(), destination);
        if let Err(err) = self.write_frame(&frame) {
            self.inner.lock_state().registry.remove(id);
            return Err(err);
        }
        info!(%id, destination, "subscribed");
        Ok(SubscriptionHandle {
            id,
            destination: destination.to_string(),
        })
    }

    /// Cancel one subscription.
    ///
    /// The entry is removed before UNSUBSCRIBE is written, so concurrent
    /// calls for the same handle send the frame once. If the write fails
    /// the entry is put back. Unsubscribing a handle that is no longer
    /// registered is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        let (removed, generation) = {
            let mut state = self.inner.lock_state();
            if state.status != SessionStatus::Connected {
                return Err(SessionError::NotConnected);
            }
            match state.registry.remove(handle.id) {
                Some(removed) => (removed, state.generation),
                None => {
                    debug!(id = %handle.id, "subscription already gone");
                    return Ok(());
                }
            }
        };

        if let Err(err) = self.write_frame(&Frame::unsubscribe(&handle.id.to_string())) {
            let mut state = self.inner.lock_state();
            if state.status == SessionStatus::Connected && state.generation == generation {
                state.registry.restore(removed);
            }
            return Err(err);
        }
        info!(id = %handle.id, destination = %handle.destination, "unsubscribed");
        Ok(())
    }

    /// Cancel every subscription to `destination`, returning how many there were.
    ///
    /// Matching subscriptions are removed in one locked step before any
    /// UNSUBSCRIBE is written, so no MESSAGE lookup that starts after the
    /// removal finds them. A consumer call already in flight may still
    /// complete. Every UNSUBSCRIBE is attempted and the first write error
    /// is returned.
    pub fn unsubscribe_all(&self, destination: &str) -> Result<usize> {
        let ids = {
            let mut state = self.inner.lock_state();
            if state.status != SessionStatus::Connected {
                return Err(SessionError::NotConnected);
            }
            state.registry.remove_all(destination)
        };

        let mut first_error = None;
        for id in &ids {
            if let Err(err) = self.write_frame(&Frame::unsubscribe(&id.to_string())) {
                warn!(%id, error = %err, "UNSUBSCRIBE not sent");
                first_error.get_or_insert(err);
            }
        }
        info!(destination, count = ids.len(), "unsubscribed all");
        match first_error {
            Some(err) => Err(err),
            None => Ok(ids.len()),
        }
    }

    /// Process one transport event.
    ///
    /// The event is treated as coming from the current connection. The
    /// sink installed by [`connect`](Self::connect) filters out events
    /// from earlier connections before calling this.
    pub fn handle_event(&self, event: TransportEvent) {
        self.dispatch_event(None, event);
    }

    fn dispatch_event(&self, generation: Option<u64>, event: TransportEvent) {
        match event {
            TransportEvent::Opened => debug!("transport opened"),
            TransportEvent::Text(text) => {
                if let Err(err) = self.handle_text(&text) {
                    warn!(error = %err, "inbound frame dropped");
                    self.inner
                        .notifier
                        .notify(&ConnectionEvent::InboundDropped(err.to_string()));
                }
            }
            TransportEvent::Closed {
                code,
                reason,
                by_server,
            } => self.on_transport_closed(generation, code, &reason, by_server),
            TransportEvent::Error(cause) => {
                warn!(%cause, "transport error");
                self.inner
                    .notifier
                    .notify(&ConnectionEvent::TransportError(cause));
            }
        }
    }

    /// Decode and act on one inbound text message.
    ///
    /// Heart-beats are ignored. Errors describe frames that could not be
    /// decoded or routed; none of them change the session status except a
    /// rejected CONNECTED.
    pub fn handle_text(&self, text: &str) -> Result<()> {
        if is_heartbeat(text) {
            trace!("heart-beat received");
            return Ok(());
        }

        let frame = decode_frame(text)?;
        trace!(command = %frame.command(), size = frame.wire_size(), "frame received");
        match frame.command() {
            Command::Connected => self.on_connected(&frame),
            Command::Message => self.on_message(&frame),
            Command::Error => {
                self.on_error_frame(&frame);
                Ok(())
            }
            Command::Receipt => {
                debug!(receipt_id = ?frame.header(header::RECEIPT_ID), "receipt received");
                Ok(())
            }
            Command::Disconnect => {
                self.mark_disconnected(None, None, "server sent DISCONNECT", true);
                Ok(())
            }
            other => {
                debug!(command = %other, "ignoring client-only frame from server");
                Ok(())
            }
        }
    }

    fn on_connected(&self, frame: &Frame) -> Result<()> {
        let outcome = {
            let mut state = self.inner.lock_state();
            if state.status != SessionStatus::Connecting {
                debug!(status = %state.status, "unexpected CONNECTED ignored");
                return Ok(());
            }
            match handshake::validate_connected(&self.inner.config, frame) {
                Ok(version) => {
                    state.status = SessionStatus::Connected;
                    state.server_version = version.clone();
                    self.inner.publish(&state);
                    Ok(version)
                }
                Err(err) => {
                    state.status = SessionStatus::Disconnected;
                    state.handshake_error = Some(err.to_string());
                    state.registry.clear();
                    self.inner.publish(&state);
                    Err(err)
                }
            }
        };

        match outcome {
            Ok(version) => {
                info!(version = ?version, "STOMP session established");
                self.inner
                    .notifier
                    .notify(&ConnectionEvent::Connected { version });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "CONNECTED rejected, closing transport");
                let _ = self.inner.transport.disconnect();
                self.inner
                    .notifier
                    .notify(&ConnectionEvent::Disconnected { by_server: false });
                Err(err)
            }
        }
    }

    fn on_message(&self, frame: &Frame) -> Result<()> {
        let raw = frame
            .header(header::SUBSCRIPTION)
            .ok_or(SessionError::MissingHeader(header::SUBSCRIPTION))?;
        let id: SubscriptionId = raw.parse()?;
        let consumer = self.inner.lock_state().registry.consumer(id)?;
        trace!(%id, message_id = ?frame.header(header::MESSAGE_ID), "dispatching message");
        consumer(frame);
        Ok(())
    }

    fn on_error_frame(&self, frame: &Frame) {
        let message = frame.header(header::MESSAGE).map(str::to_string);
        let body = frame.body().map(str::to_string);
        warn!(message = ?message, "server sent ERROR frame");
        self.inner
            .notifier
            .notify(&ConnectionEvent::ProtocolError { message, body });
    }

    fn on_transport_closed(
        &self,
        generation: Option<u64>,
        code: Option<u16>,
        reason: &str,
        by_server: bool,
    ) {
        debug!(?code, reason, by_server, "transport closed");
        self.mark_disconnected(generation, code, reason, by_server);
    }

    /// Move to DISCONNECTED after the connection ended.
    ///
    /// With `Some(generation)`, nothing happens unless that generation is
    /// still current; the check runs under the same lock as the transition.
    fn mark_disconnected(
        &self,
        generation: Option<u64>,
        code: Option<u16>,
        reason: &str,
        by_server: bool,
    ) {
        let (previous, dropped) = {
            let mut state = self.inner.lock_state();
            if generation.is_some_and(|closed| closed != state.generation) {
                trace!(
                    ?generation,
                    current = state.generation,
                    "close of an earlier connection ignored"
                );
                return;
            }
            let previous = state.status;
            if previous == SessionStatus::Disconnected {
                return;
            }
            if previous == SessionStatus::Connecting {
                state.handshake_error = Some(format!(
                    "connection closed during handshake ({})",
                    if reason.is_empty() { "no reason" } else { reason }
                ));
            }
            state.status = SessionStatus::Disconnected;
            state.server_version = None;
            let dropped = state.registry.clear();
            self.inner.publish(&state);
            (previous, dropped)
        };

        info!(
            ?code,
            reason,
            by_server,
            previous = %previous,
            subscriptions = dropped,
            "STOMP session lost"
        );
        self.inner
            .notifier
            .notify(&ConnectionEvent::Disconnected { by_server });
    }

    fn abort_handshake(&self, reason: String) {
        {
            let mut state = self.inner.lock_state();
            if state.status != SessionStatus::Connecting {
                return;
            }
            state.status = SessionStatus::Disconnected;
            state.handshake_error = Some(reason);
            self.inner.publish(&state);
        }
        self.inner
            .notifier
            .notify(&ConnectionEvent::Disconnected { by_server: false });
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.status() == SessionStatus::Connected {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    fn write_frame(&self, frame: &Frame) -> Result<()> {
        let text = encode_frame(frame);
        trace!(command = %frame.command(), size = text.len(), "writing frame");
        self.inner.transport.send_text(&text)?;
        Ok(())
    }

    /// Sink for the connection opened as `generation`.
    fn event_sink(&self, generation: u64) -> EventSink {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |event| {
            let Some(inner) = inner.upgrade() else {
                trace!(?event, "session dropped, transport event discarded");
                return;
            };
            let current = inner.lock_state().generation;
            if current != generation {
                trace!(generation, current, ?event, "event from an earlier connection discarded");
                return;
            }
            Session { inner }.dispatch_event(Some(generation), event);
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("Session")
            .field("host", &self.inner.transport.host())
            .field("status", &state.status)
            .field("server_version", &state.server_version)
            .field("subscriptions", &state.registry.len())
            .finish()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        // Consumers and listeners run outside the lock, so a poisoned state is still consistent.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wake status waiters. Call with the state lock held, after a change.
    fn publish(&self, state: &State) {
        self.status_changed.notify_all();
        #[cfg(feature = "async")]
        self.status_tx.send_replace(state.status);
        #[cfg(not(feature = "async"))]
        let _ = state;
    }
}

fn handshake_outcome(state: &State) -> Result<()> {
    match state.status {
        SessionStatus::Connected => Ok(()),
        SessionStatus::Connecting => Err(SessionError::NotConnected),
        SessionStatus::Disconnected => match &state.handshake_error {
            Some(reason) => Err(SessionError::HandshakeFailed(reason.clone())),
            None => Err(SessionError::NotConnected),
        },
    }
}
