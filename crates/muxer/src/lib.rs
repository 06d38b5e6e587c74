//! Request/response multiplexer over a single full-duplex channel.
//!
//! Many tasks submit requests concurrently; the underlying transport
//! serializes each direction and may answer out of order. This crate turns
//! that into a thread-safe, cancellable, per-request-timed `send` API.
//!
//! # Architecture
//!
//! - [`Multiplexer`] is the public facade: `start`, `send`, `post`, `stop`,
//!   and the Created → Running → Stopping → Stopped lifecycle.
//! - A pending table maps each in-flight request identifier to a one-shot
//!   completion slot its caller awaits.
//! - A write pump drains the bounded submission queue into the transport in
//!   submission order; a read pump routes each arriving response to its
//!   slot by identifier.
//! - Per-request deadlines and caller cancellation race the response; the
//!   first resolver to claim the entry wins and the others become no-ops.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use muxer::{Config, Multiplexer};
//! use tokio_util::sync::CancellationToken;
//! use transport::{testing, Request};
//!
//! # async fn demo() -> Result<(), muxer::Error> {
//! let (channel, peer) = testing::channel();
//! testing::spawn_echo(peer);
//!
//! let never = CancellationToken::new();
//! let mux = Multiplexer::new(channel, Config::new(Duration::from_secs(5))?);
//! mux.start(&never).await?;
//! let response = mux.send(Request::new(1u64, "ping".as_bytes()), &never).await?;
//! mux.stop(&never).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Scope
//!
//! Wire framing, reconnection, and authentication belong to the transport
//! implementation behind the [`transport::Transport`] trait. Response
//! payloads are opaque here; the only validation is the identifier match.

mod config;
mod error;
mod lifecycle;
mod multiplexer;
mod pending;
mod read_pump;
mod write_pump;

pub use config::{Config, DEFAULT_SUBMISSION_CAPACITY};
pub use error::Error;
pub use lifecycle::Lifecycle;
pub use multiplexer::Multiplexer;

// the records callers handle directly
pub use transport::{Request, RequestId, Response, TransportError};
