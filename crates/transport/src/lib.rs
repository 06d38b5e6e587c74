//! Transport contract for request/response channels.
//!
//! This crate defines the boundary between a request/response multiplexer
//! and the wire: message records ([`Request`], [`Response`], [`RequestId`])
//! and the [`Transport`] trait family.
//!
//! # Architecture
//!
//! A [`Transport`] is a full-duplex message channel that is split exactly
//! once into two independently-owned halves:
//!
//! - [`ReadHalf`] receives responses from the peer
//! - [`WriteHalf`] sends requests to the peer
//!
//! Each half permits at most one operation in flight at a time; taking
//! `&mut self` encodes that in ownership, so no further locking is needed.
//! The two halves may be driven concurrently with each other.
//!
//! # Scope
//!
//! This crate intentionally handles only the transport boundary. Wire
//! framing, reconnection, and authentication belong to concrete transport
//! implementations; request/response correlation and lifecycle belong to
//! the `muxer` crate.

mod error;
mod message;

pub mod testing;

pub use error::TransportError;
pub use message::{Request, RequestId, Response};

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// A full-duplex message channel that can be split into receive and send
/// halves.
///
/// # Example
///
/// ```
/// use transport::{split, testing};
///
/// let (channel, _peer) = testing::channel();
/// let (_reader, _writer) = split(channel);
/// ```
pub trait Transport: Send + 'static {
    /// The receive half type.
    type Reader: ReadHalf;
    /// The send half type.
    type Writer: WriteHalf;

    /// Split the transport into its two halves.
    fn into_split(self) -> (Self::Reader, Self::Writer);
}

/// The receive direction of a transport.
pub trait ReadHalf: Send + 'static {
    /// Receive the next response from the peer.
    ///
    /// Resolves with a response, with [`TransportError::Cancelled`] when
    /// `cancel` fires first, or with a transport error when the channel
    /// fails. Callers must not issue a second read while one is in flight;
    /// `&mut self` enforces this.
    fn read(
        &mut self,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// The send direction of a transport.
pub trait WriteHalf: Send + 'static {
    /// Deliver one request to the peer.
    ///
    /// Resolves once the request has been handed to the wire, with
    /// [`TransportError::Cancelled`] when `cancel` fires first, or with a
    /// transport error. Writes are serial per half but may overlap with
    /// reads on the sibling [`ReadHalf`].
    fn write(
        &mut self,
        request: Request,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Split a transport into a reader/writer pair.
///
/// Convenience free function mirroring [`Transport::into_split`].
pub fn split<T: Transport>(transport: T) -> (T::Reader, T::Writer) {
    transport.into_split()
}
