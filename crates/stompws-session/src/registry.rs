use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use stompws_frame::Frame;
use tracing::debug;

use crate::error::{Result, SessionError};

/// Callback invoked with each MESSAGE frame delivered for a subscription.
pub type MessageConsumer = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Client-chosen subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u32>()
            .map(SubscriptionId)
            .map_err(|_| SessionError::InvalidSubscriptionId(s.to_string()))
    }
}

/// A registered subscription.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    destination: String,
    consumer: MessageConsumer,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn consumer(&self) -> &MessageConsumer {
        &self.consumer
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

/// Maps subscription ids to their destination and consumer.
///
/// The registry itself is not synchronized; the session keeps it behind
/// the same lock as its connection status.
pub struct SubscriptionRegistry {
    entries: HashMap<SubscriptionId, Subscription>,
    next_id: u32,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a consumer and return its fresh id.
    ///
    /// Ids come from a wrapping counter that skips 0 and any id still
    /// active, so an id is never handed out twice while registered.
    pub fn add(&mut self, destination: &str, consumer: MessageConsumer) -> SubscriptionId {
        let id = self.fresh_id();
        self.entries.insert(
            id,
            Subscription {
                id,
                destination: destination.to_string(),
                consumer,
            },
        );
        debug!(%id, destination, "subscription registered");
        id
    }

    /// Remove one subscription. Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: SubscriptionId) -> Option<Subscription> {
        let removed = self.entries.remove(&id);
        if removed.is_some() {
            debug!(%id, "subscription removed");
        }
        removed
    }

    /// Remove every subscription for `destination`, returning their ids.
    pub fn remove_all(&mut self, destination: &str) -> Vec<SubscriptionId> {
        let ids = self.ids_for(destination);
        for id in &ids {
            self.entries.remove(id);
        }
        if !ids.is_empty() {
            debug!(destination, count = ids.len(), "subscriptions removed");
        }
        ids
    }

    /// Ids registered for `destination`, in ascending order.
    pub fn ids_for(&self, destination: &str) -> Vec<SubscriptionId> {
        let mut ids: Vec<SubscriptionId> = self
            .entries
            .values()
            .filter(|subscription| subscription.destination == destination)
            .map(|subscription| subscription.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Put back a subscription taken out with [`remove`](Self::remove).
    ///
    /// An entry already registered under the same id is left untouched.
    pub fn restore(&mut self, subscription: Subscription) {
        let id = subscription.id;
        self.entries.entry(id).or_insert(subscription);
        debug!(%id, "subscription restored");
    }

    /// Resolve the consumer a MESSAGE for `id` is dispatched to.
    ///
    /// The consumer is cloned out so the caller can invoke it after
    /// releasing whatever lock guards the registry.
    pub fn consumer(&self, id: SubscriptionId) -> Result<MessageConsumer> {
        self.entries
            .get(&id)
            .map(|subscription| Arc::clone(&subscription.consumer))
            .ok_or(SessionError::UnknownSubscription(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every subscription, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    fn fresh_id(&mut self) -> SubscriptionId {
        loop {
            let candidate = SubscriptionId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
