//! Clients, rooms, and the registries that hold them.
//!
//! # Key types
//!
//! - [`Registry`]: a lock-guarded ID map that hands out snapshots
//! - [`Client`]: an authenticated account bound to its connection
//! - [`Room`]: a named member list with join/leave notices and broadcast
//! - [`ClientList`] / [`RoomList`]: the two registries the server uses
//! - [`move_client`]: the two-phase room switch behind `join`

mod client;
mod error;
mod registry;
mod room;

pub use client::Client;
pub use error::RoomError;
pub use registry::{Keyed, Registry};
pub use room::{ClientList, DEFAULT_ROOM_ID, Room, RoomList, move_client};
