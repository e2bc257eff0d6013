//! # Roomcast
//!
//! A multi-room chat server. Clients connect over WebSocket, authenticate
//! with a username, and exchange short text messages that are fanned out
//! to everyone in their room.
//!
//! The workspace is layered, and this crate ties the layers together:
//!
//! - `roomcast-transport`: binary frames over WebSocket (or in memory)
//! - `roomcast-protocol`: the packet envelope and JSON payloads
//! - `roomcast-session`: one client's connection, liveness, and auth
//! - `roomcast-room`: clients, rooms, and their registries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RoomcastError> {
//!     let server = ChatServer::builder().bind("0.0.0.0:3000").build().await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Commands
//!
//! A chat message sent with `is_command: true` is handled by the server
//! instead of being broadcast: `ls`, `ping`, `client-ping`,
//! `join <roomID>`, and `new <name>`. See [`Command`].

mod commands;
mod config;
mod error;
mod handler;
mod server;

pub use commands::{Command, format_elapsed};
pub use config::{
    DEFAULT_ADDR, DEFAULT_KEEPALIVE, DEFAULT_PATH, ENV_ADDR, ENV_KEEPALIVE_SECS, ENV_PATH,
    ServerConfig,
};
pub use error::RoomcastError;
pub use server::{ChatServer, ChatServerBuilder};

/// Everything needed to run or embed a server, in one import.
pub mod prelude {
    pub use crate::{ChatServer, ChatServerBuilder, RoomcastError, ServerConfig};

    pub use roomcast_protocol::{
        Account, AuthStatus, ChatMessage, ChatRoom, ClientAuth, Id, Packet, PacketPayload,
        PacketType, ServerAuth,
    };
    pub use roomcast_room::{Client, Room, RoomList};
    pub use roomcast_session::{Authenticator, SessionError, UsernameAuthenticator};
    pub use roomcast_transport::{
        Connection, MemoryConnector, MemoryPeer, MemoryTransport, Transport, WebSocketTransport,
    };
}
