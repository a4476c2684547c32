//! STOMP 1.2 messaging client over WebSocket.
//!
//! stompws speaks the client side of STOMP: connect to a broker, send to
//! destinations and subscribe consumers that are called for each MESSAGE.
//!
//! # Crate Structure
//!
//! - [`transport`] - Message transport abstraction (in-memory, WebSocket)
//! - [`frame`] - STOMP frame model and text codec
//! - [`session`] - Session state machine, subscriptions and dispatch
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "websocket")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = stompws::session::connect("ws://localhost:7777/hello")?;
//! session.subscribe("/topic/greetings", |frame| {
//!     println!("{}", frame.body().unwrap_or_default());
//! })?;
//! session.send("/app/hello", "Jack")?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "websocket"))]
//! # fn main() {}
//! ```

/// Re-export transport types.
pub mod transport {
    pub use stompws_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use stompws_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use stompws_session::*;
}

pub use stompws_frame::{Command, Frame};
pub use stompws_session::{ConnectionEvent, Session, SessionConfig, SessionError, SessionStatus};
