//! STOMP 1.2 text frame model and codec.
//!
//! A frame is a command line, `name:value` header lines, a blank line,
//! an optional body and a terminating NUL:
//!
//! ```text
//! SEND
//! destination:/app/hello
//!
//! {"name":"Jack"}\0
//! ```
//!
//! Header values are written verbatim (no escaping); decoding splits a
//! header line on its first `:` only.

pub mod codec;
pub mod command;
pub mod error;
pub mod header;

pub use codec::{decode_frame, encode_frame, is_heartbeat, Frame, Headers, NUL};
pub use command::Command;
pub use error::{ErrorKind, FrameError, Result};
