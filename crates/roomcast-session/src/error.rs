//! Error types for the session layer.

use roomcast_protocol::ProtocolError;
use roomcast_transport::TransportError;

/// Errors that can occur while talking to one client.
///
/// Every way a connection can simply *end* (peer closed, already closed,
/// peer dropped) is folded into [`SessionError::ConnectionClosed`], so
/// callers can tell an ordinary goodbye from a real failure with a single
/// match.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection is gone. Not a failure worth reporting.
    #[error("connection closed")]
    ConnectionClosed,

    /// Nothing (data or heartbeat) arrived before the liveness deadline.
    #[error("connection timed out waiting for activity")]
    Timeout,

    /// The transport failed in an unexpected way.
    #[error(transparent)]
    Transport(TransportError),

    /// Bytes arrived but could not be parsed as a packet or payload.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The client's credentials were rejected by the
    /// [`Authenticator`](crate::Authenticator). Carries the reason sent
    /// back to the client.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
}

impl SessionError {
    /// Returns `true` if the connection simply ended.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        if err.is_closed() {
            Self::ConnectionClosed
        } else {
            Self::Transport(err)
        }
    }
}
