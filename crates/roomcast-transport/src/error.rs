/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is closed: the peer went away or `close` was
    /// already called. This is the expected way for a connection to end.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed for a reason other than a closed connection.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed for a reason other than a closed connection.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer sent a frame kind this transport does not carry.
    #[error("unexpected {0} frame, expected binary")]
    UnexpectedFrame(&'static str),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns `true` if this error only means the connection has ended.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }
}
