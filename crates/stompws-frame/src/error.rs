/// Errors that can occur while decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The command line does not name a supported STOMP command.
    #[error("unknown STOMP command: {0:?}")]
    UnknownCommand(String),

    /// The text is not a well-formed frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Coarse classification of a [`FrameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownCommand,
    MalformedFrame,
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            FrameError::MalformedFrame(_) => ErrorKind::MalformedFrame,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
