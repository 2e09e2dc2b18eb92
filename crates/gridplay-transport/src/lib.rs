//! Transport abstraction layer for Gridplay.
//!
//! A [`Transport`] hands out [`Connection`]s. A connection is consumed by
//! [`Connection::split`], which yields an outbound [`FrameSink`] and an
//! inbound [`FrameStream`] so one task can write while another blocks on
//! the read.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//!
//! The in-memory [`MemoryConnection`] is always available. It is what the
//! server tests run on, and it is handy for embedding the server behind a
//! transport this crate does not know about.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryPeer};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::pin::Pin;

use futures_util::Sink;
use futures_util::stream::BoxStream;

/// Close reason sent to the peer when the server ends a connection.
pub const CLOSE_REASON: &str = "connection closed by server";

/// A frame the server writes to a peer.
///
/// Inbound traffic has no such enum: the read side only ever surfaces data
/// frames, and a close from the peer simply ends the [`FrameStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text payload.
    Text(String),
    /// A liveness probe with an empty payload.
    Ping,
    /// A graceful close (code 1000, [`CLOSE_REASON`]).
    Close,
}

/// The write half of a split connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// The read half of a split connection.
///
/// Yields one item per inbound data frame. Ends with `None` once the peer
/// closes or the underlying stream is gone.
pub type FrameStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single duplex, message-oriented connection.
pub trait Connection: Send + 'static {
    /// A printable form of the remote address, used in logs.
    fn peer_addr(&self) -> String;

    /// Splits the connection into independently owned halves.
    fn split(self) -> (FrameSink, FrameStream);
}
