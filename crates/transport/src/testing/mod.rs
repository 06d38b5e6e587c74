//! Testing utilities for the transport layer.
//!
//! This module provides an in-memory transport for exercising code that
//! consumes a [`Transport`](crate::Transport) without touching the network:
//! a [`ChannelTransport`] connected to a scriptable [`TestPeer`], plus an
//! echo helper for the common request-mirroring setup.

mod memory;

pub use memory::{channel, spawn_echo, ChannelReader, ChannelTransport, ChannelWriter, TestPeer};
