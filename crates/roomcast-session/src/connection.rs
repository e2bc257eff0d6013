//! The per-client connection wrapper.
//!
//! A [`ClientConnection`] sits on top of one transport [`Connection`] and
//! adds what the chat lifecycle needs from it:
//!
//! - **Locking**: writes come from the owning task *and* from every task
//!   broadcasting into the client's room, so each direction has its own
//!   lock and frames never interleave.
//! - **Packets**: `read_packet`/`write_packet` compose framing with the
//!   raw frame I/O.
//! - **Liveness**: a deadline that inbound heartbeats, `Ping` packets and
//!   explicit [`ClientConnection::ping`] calls push forward. A read that is
//!   still waiting when the deadline passes fails with
//!   [`SessionError::Timeout`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use roomcast_protocol::Packet;
use roomcast_transport::{Connection, ConnectionId, Inbound};
use tokio::sync::Mutex;
use tokio::time::{self, Instant};

use crate::SessionError;

/// One client's connection, safe to share behind an `Arc`.
pub struct ClientConnection<C: Connection> {
    conn: C,
    write_lock: Mutex<()>,
    read_lock: Mutex<()>,
    keepalive: Duration,
    /// Reference point for `deadline_ms`.
    epoch: Instant,
    /// Liveness deadline, in milliseconds after `epoch`.
    deadline_ms: AtomicU64,
}

impl<C: Connection> ClientConnection<C> {
    /// Wraps `conn`; the first deadline is `keepalive` from now.
    pub fn new(conn: C, keepalive: Duration) -> Self {
        let epoch = Instant::now();
        Self {
            conn,
            write_lock: Mutex::new(()),
            read_lock: Mutex::new(()),
            keepalive,
            epoch,
            deadline_ms: AtomicU64::new(millis(keepalive)),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    /// The instant after which a pending read gives up.
    pub fn expires_at(&self) -> Instant {
        self.epoch + Duration::from_millis(self.deadline_ms.load(Ordering::Acquire))
    }

    /// Records activity: the deadline becomes now + keepalive.
    pub fn ping(&self) {
        let now = millis(self.epoch.elapsed());
        self.deadline_ms
            .store(now.saturating_add(millis(self.keepalive)), Ordering::Release);
    }

    /// Sends one binary frame.
    ///
    /// # Errors
    /// [`SessionError::ConnectionClosed`] if the connection is gone; any
    /// other transport failure as [`SessionError::Transport`].
    pub async fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        self.conn.send(data).await?;
        Ok(())
    }

    /// Waits for the next binary frame.
    ///
    /// Heartbeats refresh liveness and are swallowed.
    ///
    /// # Errors
    /// - [`SessionError::Timeout`] if the deadline passes first.
    /// - [`SessionError::ConnectionClosed`] if the peer closed.
    /// - [`SessionError::Transport`] for a text frame or I/O failure.
    pub async fn read(&self) -> Result<Vec<u8>, SessionError> {
        let _guard = self.read_lock.lock().await;
        loop {
            match self.recv_before_deadline().await? {
                Inbound::Binary(data) => return Ok(data),
                Inbound::Heartbeat => {
                    tracing::trace!(conn = %self.id(), "heartbeat");
                    self.ping();
                }
                Inbound::Closed => return Err(SessionError::ConnectionClosed),
            }
        }
    }

    /// Frames and sends a packet.
    pub async fn write_packet(&self, packet: &Packet) -> Result<(), SessionError> {
        self.write(&packet.encode()).await
    }

    /// Reads one frame and parses it as a packet.
    ///
    /// # Errors
    /// Everything [`read`](Self::read) returns, plus
    /// [`SessionError::Protocol`] for a malformed or foreign-version frame.
    pub async fn read_packet(&self) -> Result<Packet, SessionError> {
        let data = self.read().await?;
        Ok(Packet::decode(&data)?)
    }

    /// Closes the underlying transport. Safe to call more than once.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.conn.close().await?;
        Ok(())
    }

    /// Polls one `recv` until it completes or the deadline truly passes.
    ///
    /// The deadline can move while we wait (another task may call
    /// `ping`), so a fired timer only ends the wait if the current
    /// deadline has also passed.
    async fn recv_before_deadline(&self) -> Result<Inbound, SessionError> {
        let recv = self.conn.recv();
        tokio::pin!(recv);
        loop {
            let deadline = self.expires_at();
            tokio::select! {
                result = &mut recv => return Ok(result?),
                _ = time::sleep_until(deadline) => {
                    if Instant::now() >= self.expires_at() {
                        return Err(SessionError::Timeout);
                    }
                }
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
