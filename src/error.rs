//! Error types and handling for byte streams
//!
//! `EndOfStream` and `WouldBlock` are control-flow signals: the blocking
//! layer consumes `WouldBlock`, and the layered readers turn `EndOfStream`
//! into `None`/empty results where that is the documented behavior.
//! Everything else is caller misuse and propagates unmodified.

use std::io;

/// Main error type for byte stream operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// No more data will ever arrive
    #[error("End of stream reached")]
    EndOfStream,

    /// A non-blocking primitive could not make progress right now
    #[error("Operation would block")]
    WouldBlock,

    /// Operation attempted on a closed stream
    #[error("Stream is closed")]
    StreamClosed,

    /// Append attempted after end of input was signaled
    #[error("Stream input has already ended")]
    StreamEnded,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Head of the queue violated the chunk/EOF contract
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// A readiness wait passed its deadline
    #[error("Operation timed out")]
    Timeout,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// I/O related errors from a foreign backend
    #[error("IO error: {0}")]
    IO(String),
}

impl StreamError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamError::EndOfStream)
    }

    pub fn is_would_block(&self) -> bool {
        matches!(self, StreamError::WouldBlock)
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StreamError::InvalidArgument(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        StreamError::Unsupported(msg.into())
    }
}

impl From<io::Error> for StreamError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => StreamError::WouldBlock,
            io::ErrorKind::TimedOut => StreamError::Timeout,
            io::ErrorKind::UnexpectedEof => StreamError::EndOfStream,
            io::ErrorKind::InvalidInput => StreamError::InvalidArgument(err.to_string()),
            io::ErrorKind::Unsupported => StreamError::Unsupported(err.to_string()),
            _ => StreamError::IO(err.to_string()),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::EndOfStream => io::ErrorKind::UnexpectedEof,
            StreamError::WouldBlock => io::ErrorKind::WouldBlock,
            StreamError::StreamClosed => io::ErrorKind::NotConnected,
            StreamError::StreamEnded => io::ErrorKind::BrokenPipe,
            StreamError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            StreamError::Timeout => io::ErrorKind::TimedOut,
            StreamError::Unsupported(_) => io::ErrorKind::Unsupported,
            StreamError::ProtocolError(_) | StreamError::IO(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Result type for byte stream operations
pub type StreamResult<T> = Result<T, StreamError>;
