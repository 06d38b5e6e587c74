//! Request and response records.
//!
//! These are the records exchanged over a [`Transport`](crate::Transport).
//! Both carry an identifier used for request/response correlation; the
//! payload itself is opaque at this layer.

use std::fmt;

use bytes::Bytes;

/// Identifier correlating a request with its response.
///
/// Identifiers are assigned by the caller. They must be unique among the
/// requests in flight at the same time on a single connection; how they are
/// produced (counter, random, uuid) is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u128);

impl RequestId {
    /// Wrap a raw 128-bit value.
    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    /// The raw 128-bit value.
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl From<u128> for RequestId {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl From<u64> for RequestId {
    fn from(raw: u64) -> Self {
        Self(raw as u128)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Correlation identifier, unique among in-flight requests.
    pub id: RequestId,
    /// Opaque payload handed to the transport as-is.
    pub body: Bytes,
}

impl Request {
    /// Build a request from an identifier and payload.
    pub fn new(id: impl Into<RequestId>, body: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// An incoming response, correlated to a request by its identifier.
#[derive(Debug, Clone)]
pub struct Response {
    /// Identifier of the request this response answers.
    pub id: RequestId,
    /// Opaque payload produced by the peer.
    pub body: Bytes,
}

impl Response {
    /// Build a response from an identifier and payload.
    pub fn new(id: impl Into<RequestId>, body: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_display_is_fixed_width_hex() {
        assert_eq!(
            RequestId::new(0xdead_beef).to_string(),
            "000000000000000000000000deadbeef"
        );
    }

    #[test]
    fn request_id_roundtrips_raw_value() {
        let id = RequestId::from(42u64);
        assert_eq!(id.as_u128(), 42);
        assert_eq!(id, RequestId::new(42));
    }
}
