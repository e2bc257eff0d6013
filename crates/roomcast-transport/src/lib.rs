//! Transport abstraction layer for Roomcast.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the duplex, message-oriented link a chat client is attached through.
//! Everything above this crate deals in whole binary frames and never
//! touches sockets directly.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//! - `memory` (default): in-process transport, used by tests and embedders

mod error;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryConnection, MemoryConnector, MemoryPeer, MemoryTransport};
#[cfg(feature = "websocket")]
pub use websocket::{DEFAULT_HANDSHAKE_TIMEOUT, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a single [`Connection::recv`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One binary frame.
    Binary(Vec<u8>),
    /// A transport-level keepalive (ping or pong). Carries no data but
    /// proves the peer is still there.
    Heartbeat,
    /// The peer closed the connection cleanly.
    Closed,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    ///
    /// Returns [`TransportError::Shutdown`] once no further connections
    /// can ever arrive.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Gracefully shuts down the transport, stopping new connections.
    fn shutdown(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A single connection that can send and receive binary frames.
///
/// Implementations must be safe to `send` from several tasks at once;
/// `recv` is only ever driven by the task that owns the connection.
pub trait Connection: Send + Sync + 'static {
    /// Sends one binary frame to the remote peer.
    ///
    /// Sending on a connection that is already closed returns
    /// [`TransportError::ConnectionClosed`].
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// A text frame is a protocol violation and yields
    /// [`TransportError::UnexpectedFrame`].
    fn recv(&self) -> impl Future<Output = Result<Inbound, TransportError>> + Send;

    /// Closes the connection. Closing twice is not an error.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
