//! Unified error type for Roomcast.

use roomcast_protocol::ProtocolError;
use roomcast_room::RoomError;
use roomcast_session::SessionError;
use roomcast_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoomcastError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (framing, version, payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (closed, timeout, auth).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (not found, already a member).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RoomcastError {
    /// Returns `true` if this error only means a connection has ended.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::Session(e) => e.is_connection_closed(),
            Self::Transport(e) => e.is_closed(),
            _ => false,
        }
    }
}
