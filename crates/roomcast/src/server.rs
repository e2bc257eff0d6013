//! `ChatServer` builder and server loop.
//!
//! This is the entry point for running a Roomcast server. It ties
//! together all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roomcast_protocol::Id;
use roomcast_room::{Room, RoomList};
use roomcast_session::{Authenticator, UsernameAuthenticator};
use roomcast_transport::{Connection, Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{RoomcastError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Connection> {
    pub(crate) rooms: Arc<RoomList<C>>,
    pub(crate) default_room: Arc<Room<C>>,
    pub(crate) auth: A,
    pub(crate) keepalive: Duration,
}

/// Builder for configuring and starting a Roomcast server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use roomcast::prelude::*;
///
/// # async fn start() -> Result<(), RoomcastError> {
/// let server = ChatServer::builder()
///     .bind("0.0.0.0:3000")
///     .path("/lc")
///     .keepalive(Duration::from_secs(60))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ChatServerBuilder<A = UsernameAuthenticator> {
    config: ServerConfig,
    auth: A,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings and the
    /// [`UsernameAuthenticator`].
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            auth: UsernameAuthenticator::new(),
        }
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Authenticator> ChatServerBuilder<A> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the WebSocket upgrade path.
    pub fn path(mut self, path: &str) -> Self {
        self.config.path = path.to_string();
        self
    }

    /// Sets how long a silent connection is kept.
    pub fn keepalive(mut self, keepalive: Duration) -> Self {
        self.config.keepalive = keepalive;
        self
    }

    /// Swaps the authenticator.
    pub fn authenticator<B: Authenticator>(self, auth: B) -> ChatServerBuilder<B> {
        ChatServerBuilder {
            config: self.config,
            auth,
        }
    }

    /// Binds the WebSocket listener and builds the server.
    pub async fn build(self) -> Result<ChatServer<WebSocketTransport, A>, RoomcastError> {
        let transport =
            WebSocketTransport::bind(&self.config.bind_addr, &self.config.path).await?;
        Ok(self.with_transport(transport).await)
    }

    /// Builds the server on top of an already-open transport.
    pub async fn with_transport<T: Transport>(self, transport: T) -> ChatServer<T, A> {
        let default_room = Arc::new(Room::with_id(
            Id::new(self.config.default_room.as_str()),
            self.config.default_room.as_str(),
        ));
        let rooms = Arc::new(RoomList::new());
        rooms.add(Arc::clone(&default_room)).await;

        let state = Arc::new(ServerState {
            rooms,
            default_room,
            auth: self.auth,
            keepalive: self.config.keepalive,
        });

        ChatServer {
            transport,
            config: self.config,
            state,
        }
    }
}

/// A Roomcast chat server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChatServer<T: Transport, A: Authenticator = UsernameAuthenticator> {
    transport: T,
    config: ServerConfig,
    state: Arc<ServerState<A, T::Connection>>,
}

impl ChatServer<WebSocketTransport, UsernameAuthenticator> {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }
}

impl<A: Authenticator> ChatServer<WebSocketTransport, A> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

impl<T: Transport, A: Authenticator> ChatServer<T, A> {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The registry of every room on this server. Stays usable after
    /// [`run`](Self::run) has taken the server.
    pub fn rooms(&self) -> Arc<RoomList<T::Connection>> {
        Arc::clone(&self.state.rooms)
    }

    /// The room clients join when they ask for none (or an unknown one).
    pub fn default_room(&self) -> Arc<Room<T::Connection>> {
        Arc::clone(&self.state.default_room)
    }

    /// Runs the server accept loop until the transport shuts down.
    pub async fn run(self) -> Result<(), RoomcastError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server accept loop until `shutdown` completes.
    ///
    /// Spawns one task per accepted connection, which owns that
    /// connection from auth to close. When `shutdown` fires, the
    /// transport stops listening and this returns; connections already
    /// accepted keep running. Also returns once the transport reports it
    /// has shut down on its own. Other accept errors are logged and
    /// skipped.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RoomcastError> {
        tracing::info!(
            addr = %self.config.bind_addr,
            path = %self.config.path,
            default_room = %self.state.default_room.id(),
            "roomcast server running"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(handle_connection(conn, state));
                    }
                    Err(TransportError::Shutdown) => {
                        tracing::info!("transport shut down, stopping server");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting connections");
                    self.transport.shutdown().await?;
                    return Ok(());
                }
            }
        }
    }
}
