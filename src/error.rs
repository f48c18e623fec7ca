//! Error taxonomy for the encoder, decoder, stream adapters and orchestrator.

use std::io;

use crate::frame::types::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller mistake: an invalid option combination or call sequence.
    #[error("usage error: {0}")]
    Usage(String),

    /// The frame primitive failed. The owning encoder has been disposed.
    #[error("LZ4 operation failed, error: {}", .0.error_name())]
    Codec(FrameError),

    /// Compressed input is corrupt. The owning decoder is unusable.
    #[error("malformed LZ4 stream: {}", .0.error_name())]
    MalformedStream(FrameError),

    /// Input ended in the middle of a frame.
    #[error("LZ4 stream truncated: input ended inside a frame")]
    TruncatedStream,

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation on a disposed encoder or decoder")]
    Disposed,

    /// A compression worker panicked; the message is the panic payload.
    #[error("compression worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    /// The underlying frame code, for codec and malformed-stream failures.
    pub fn frame_error(&self) -> Option<FrameError> {
        match self {
            Error::Codec(code) | Error::MalformedStream(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Io(inner) => inner.kind(),
            Error::MalformedStream(_) => io::ErrorKind::InvalidData,
            Error::TruncatedStream => io::ErrorKind::UnexpectedEof,
            Error::Usage(_) => io::ErrorKind::InvalidInput,
            Error::Cancelled => io::ErrorKind::Interrupted,
            Error::Codec(_) | Error::Disposed | Error::WorkerPanicked(_) => io::ErrorKind::Other,
        };
        match err {
            Error::Io(inner) => inner,
            other => io::Error::new(kind, other),
        }
    }
}
