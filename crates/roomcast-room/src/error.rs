//! Error types for the room layer.

use roomcast_protocol::{Id, ProtocolError};

/// Errors that can occur during room operations.
///
/// The display strings double as the replies a client sees when a room
/// command fails, so keep them short and addressed to the user.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(Id),

    /// The client is already a member of the target room. Carries the
    /// room's display name.
    #[error("you are already in room {0}")]
    AlreadyInRoom(String),

    /// A notice could not be encoded for broadcast.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
