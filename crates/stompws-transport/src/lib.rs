//! Message transport abstraction for STOMP sessions.
//!
//! A STOMP client needs very little from the connection underneath it:
//! open, close, send a text message, and be told about inbound text and
//! connection state changes. This crate captures that surface as the
//! [`Transport`] trait and ships two implementations:
//! - [`MemoryTransport`], an in-process transport for tests and embedding
//! - `WebSocketTransport`, a blocking WebSocket client (feature `websocket`)
//!
//! This is the lowest layer of stompws. Everything else builds on top of
//! the [`Transport`] trait defined here.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::{EventSink, Transport, TransportEvent};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};
