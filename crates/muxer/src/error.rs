//! Error types surfaced by the multiplexer API.

use transport::{RequestId, TransportError};

use crate::lifecycle::Lifecycle;

/// Errors returned by [`Multiplexer`](crate::Multiplexer) operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The per-request deadline elapsed before a response arrived.
    #[error("request timed out")]
    TimedOut,

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The multiplexer is stopping or its read side died before delivery.
    #[error("multiplexer is shut down")]
    Shutdown,

    /// The identifier collided with a request already in flight.
    #[error("request {0} is already in flight")]
    DuplicateRequestId(RequestId),

    /// The transport failed for this request or for the channel as a whole.
    #[error("transport failed")]
    Transport(#[source] TransportError),

    /// The operation is not permitted in the current lifecycle state.
    #[error("operation not valid in the {0:?} state")]
    InvalidLifecycle(Lifecycle),

    /// A configuration value was rejected at construction.
    #[error("{0}")]
    InvalidArgument(&'static str),
}
