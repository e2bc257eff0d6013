//! Wire protocol for Roomcast.
//!
//! This crate defines the "language" that chat clients and the server
//! speak:
//!
//! - **Packets** ([`Packet`], [`PacketType`]): the binary envelope:
//!   a version byte, a type byte, a big-endian length and the payload.
//! - **Payloads** ([`ChatMessage`], [`ClientAuth`], [`ServerAuth`]) :
//!   JSON documents selected by the packet type.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payloads become
//!   bytes.
//! - **Identifiers** ([`Id`]): opaque random IDs for accounts, rooms
//!   and messages.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (binary frames) and session
//! (a client's connection). It never touches a socket.
//!
//! ```text
//! Transport (frames) → Protocol (Packet → payload) → Session (client)
//! ```

mod codec;
mod error;
pub mod id;
pub mod packet;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use id::Id;
pub use packet::{HEADER_LEN, PROTOCOL_VERSION, Packet, PacketHeader, PacketType};
pub use types::{
    Account, AuthStatus, ChatMessage, ChatRoom, ClientAuth, PacketPayload, ServerAuth,
};
