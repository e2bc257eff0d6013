//! Client connections and authentication for Roomcast.
//!
//! This crate handles one client's link to the server:
//!
//! 1. **Connection**: locked reads and writes, packet framing, and a
//!    liveness deadline ([`ClientConnection`])
//! 2. **Authentication**: deciding who a client is ([`Authenticator`]
//!    trait, [`UsernameAuthenticator`] default)
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← broadcasts through ClientConnection::write
//!     ↕
//! Session Layer (this crate)  ← one ClientConnection per client
//!     ↕
//! Transport + Protocol (below)  ← raw frames, Packet encoding
//! ```

mod auth;
mod connection;
mod error;

pub use auth::{Authenticator, UsernameAuthenticator};
pub use connection::ClientConnection;
pub use error::SessionError;
