//! Error types for transport implementations.

use std::io;
use std::sync::Arc;

/// Errors produced by transport read and write operations.
///
/// The type is `Clone` because a single failed read can be reported to many
/// waiting callers at once; the underlying `io::Error` is shared rather than
/// duplicated.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The operation was cancelled before it completed.
    #[error("transport operation cancelled")]
    Cancelled,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// An I/O error from the underlying byte channel.
    #[error("i/o error: {0}")]
    Io(#[source] Arc<io::Error>),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl TransportError {
    /// Whether this error is the cancellation sentinel rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
