//! STOMP 1.2 client session.
//!
//! A [`Session`] drives one STOMP conversation over one transport
//! connection: the CONNECT/CONNECTED handshake, SEND, SUBSCRIBE and
//! UNSUBSCRIBE, and the routing of inbound MESSAGE frames to the consumer
//! registered for their subscription.
//!
//! Inbound frames are processed on the transport's delivery context.
//! Consumers and connection listeners run there too: they must return
//! promptly and hand long-running work to another thread.

pub mod config;
#[cfg(feature = "websocket")]
pub mod connector;
pub mod error;
pub mod events;
pub mod handshake;
pub mod registry;
pub mod session;

pub use config::SessionConfig;
#[cfg(feature = "websocket")]
pub use connector::{connect, connect_with_config};
pub use error::{Result, SessionError};
pub use events::{ConnectionEvent, ConnectionListener, EventNotifier};
pub use registry::{MessageConsumer, Subscription, SubscriptionId, SubscriptionRegistry};
pub use session::{Session, SessionStatus, SubscriptionHandle};
