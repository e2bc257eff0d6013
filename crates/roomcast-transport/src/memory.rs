//! In-process transport backed by Tokio channels.
//!
//! [`MemoryTransport`] behaves like a listener: every
//! [`MemoryConnector::connect`] call hands it a fresh [`MemoryConnection`]
//! and returns the client end as a [`MemoryPeer`]. No sockets are involved,
//! which makes the whole server lifecycle testable in-process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Inbound, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A frame sent by the client end of a memory connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFrame {
    Binary(Vec<u8>),
    Text(String),
    Ping,
    Close,
}

/// Creates a connected server/client pair.
pub fn pair() -> (MemoryConnection, MemoryPeer) {
    let (to_server, from_peer) = mpsc::unbounded_channel();
    let (to_peer, from_server) = mpsc::unbounded_channel();

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    let conn = MemoryConnection {
        id,
        inbound: Mutex::new(from_peer),
        outbound: Mutex::new(Some(to_peer)),
        closed: AtomicBool::new(false),
    };
    let peer = MemoryPeer {
        tx: to_server,
        rx: from_server,
    };
    (conn, peer)
}

/// Creates a transport and the connector used to dial into it.
pub fn transport() -> (MemoryTransport, MemoryConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stopped = Arc::new(AtomicBool::new(false));
    (
        MemoryTransport {
            incoming: rx,
            stopped: Arc::clone(&stopped),
        },
        MemoryConnector { tx, stopped },
    )
}

/// The server end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<PeerFrame>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    closed: AtomicBool,
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let tx = outbound.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("connection already closed".into())
        })?;
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn recv(&self) -> Result<Inbound, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(Inbound::Closed);
        }
        match self.inbound.lock().await.recv().await {
            Some(PeerFrame::Binary(data)) => Ok(Inbound::Binary(data)),
            Some(PeerFrame::Text(_)) => Err(TransportError::UnexpectedFrame("text")),
            Some(PeerFrame::Ping) => Ok(Inbound::Heartbeat),
            Some(PeerFrame::Close) | None => Ok(Inbound::Closed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender ends the peer's receive stream.
        self.outbound.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// The client end of an in-memory connection.
pub struct MemoryPeer {
    tx: mpsc::UnboundedSender<PeerFrame>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// Sends a binary frame to the server.
    pub fn send_binary(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.push(PeerFrame::Binary(data))
    }

    /// Sends a text frame to the server.
    pub fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.push(PeerFrame::Text(text.to_string()))
    }

    /// Sends a transport-level ping.
    pub fn ping(&self) -> Result<(), TransportError> {
        self.push(PeerFrame::Ping)
    }

    /// Closes the client side of the connection.
    pub fn close(&self) -> Result<(), TransportError> {
        self.push(PeerFrame::Close)
    }

    /// Waits for the next frame from the server. Returns `None` once the
    /// server has closed the connection.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Returns a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    fn push(&self, frame: PeerFrame) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed("server dropped".into()))
    }
}

/// A [`Transport`] whose connections come from a [`MemoryConnector`].
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
    stopped: Arc<AtomicBool>,
}

impl Transport for MemoryTransport {
    type Connection = MemoryConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    /// Refuses further dials; connections already handed out stay open.
    async fn shutdown(&self) -> Result<(), TransportError> {
        self.stopped.store(true, Ordering::Release);
        Ok(())
    }
}

/// Dials into a [`MemoryTransport`]. Dropping every connector shuts the
/// transport down.
#[derive(Clone)]
pub struct MemoryConnector {
    tx: mpsc::UnboundedSender<MemoryConnection>,
    stopped: Arc<AtomicBool>,
}

impl MemoryConnector {
    /// Opens a new connection and returns its client end.
    pub fn connect(&self) -> Result<MemoryPeer, TransportError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        let (conn, peer) = pair();
        self.tx.send(conn).map_err(|_| TransportError::Shutdown)?;
        Ok(peer)
    }
}
