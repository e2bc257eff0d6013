//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{Connection, ConnectionId, Inbound, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a peer gets to finish the HTTP upgrade before it is dropped.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upgraded connections waiting for [`Transport::accept`].
const ACCEPT_BACKLOG: usize = 64;

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// A background task owns the listener. Every TCP connection gets its own
/// handshake task, bounded by the handshake timeout, so a peer that never
/// finishes the upgrade holds up nobody else. Only upgrade requests for
/// the configured path are accepted; any other path is answered with
/// `404 Not Found` and never reaches [`accept`](Transport::accept).
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address, accepting
    /// upgrades at `path`.
    pub async fn bind(addr: &str, path: &str) -> Result<Self, TransportError> {
        Self::bind_with_timeout(addr, path, DEFAULT_HANDSHAKE_TIMEOUT).await
    }

    /// Like [`bind`](Self::bind), with an explicit handshake timeout.
    pub async fn bind_with_timeout(
        addr: &str,
        path: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::AcceptFailed)?;

        let (tx, incoming) = mpsc::channel(ACCEPT_BACKLOG);
        let acceptor = tokio::spawn(accept_loop(
            listener,
            Arc::from(path),
            handshake_timeout,
            tx,
        ));

        tracing::info!(%local_addr, path, "WebSocket transport listening");
        Ok(Self {
            local_addr,
            incoming,
            acceptor,
        })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    /// Stops listening. Handshakes already in flight may still complete;
    /// after that, `accept` returns [`TransportError::Shutdown`].
    async fn shutdown(&self) -> Result<(), TransportError> {
        self.acceptor.abort();
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    path: Arc<str>,
    handshake_timeout: Duration,
    tx: mpsc::Sender<WebSocketConnection>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept failed");
                // Errors like EMFILE persist; don't spin on them.
                time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        let path = Arc::clone(&path);
        let tx = tx.clone();
        tokio::spawn(async move {
            match time::timeout(handshake_timeout, upgrade(stream, &path)).await {
                Ok(Ok(ws)) => {
                    let conn = WebSocketConnection::new(ws);
                    tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
                    if tx.send(conn).await.is_err() {
                        tracing::debug!(%addr, "transport shut down, dropping connection");
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(%addr, error = %e, "WebSocket handshake failed");
                }
                Err(_) => {
                    tracing::debug!(%addr, ?handshake_timeout, "WebSocket handshake timed out");
                }
            }
        });
    }
}

/// Runs the server side of the HTTP upgrade, refusing foreign paths.
async fn upgrade(stream: TcpStream, path: &str) -> Result<WsStream, WsError> {
    let check_path = |req: &Request, resp: Response| {
        if req.uri().path() == path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some("not found".to_string()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };
    tokio_tungstenite::accept_hdr_async(stream, check_path).await
}

/// A single WebSocket connection.
///
/// The socket is split so that a task blocked in [`recv`](Connection::recv)
/// never holds up writers: each half sits behind its own lock.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: AtomicBool,
}

impl WebSocketConnection {
    fn new(ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(
                "connection already closed".into(),
            ));
        }
        let msg = Message::Binary(data.to_vec().into());
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| classify(e, std::io::ErrorKind::BrokenPipe, TransportError::SendFailed))
    }

    async fn recv(&self) -> Result<Inbound, TransportError> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Inbound::Binary(data.to_vec()));
                }
                Some(Ok(Message::Text(_))) => {
                    return Err(TransportError::UnexpectedFrame("text"));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    return Ok(Inbound::Heartbeat);
                }
                Some(Ok(Message::Close(_))) | None => return Ok(Inbound::Closed),
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    return Err(classify(
                        e,
                        std::io::ErrorKind::ConnectionReset,
                        TransportError::ReceiveFailed,
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.sink.lock().await.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Maps a tungstenite error onto the transport taxonomy: orderly closure
/// becomes `ConnectionClosed`, anything else keeps its detail.
fn classify(
    err: WsError,
    kind: std::io::ErrorKind,
    wrap: fn(std::io::Error) -> TransportError,
) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            TransportError::ConnectionClosed(err.to_string())
        }
        other => wrap(std::io::Error::new(kind, other)),
    }
}
