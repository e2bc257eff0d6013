//! Rooms: named groups of clients that share a message stream.
//!
//! A room has no state of its own beyond its member list, so there is
//! no actor here. Each operation takes the registry lock just long enough
//! to change or copy the map, then does its network I/O against the copy.

use std::sync::Arc;

use roomcast_protocol::{Account, ChatMessage, ChatRoom, Id, PacketPayload, id::ROOM_ID_LEN};
use roomcast_transport::Connection;

use crate::{Client, Keyed, Registry, RoomError};

/// The clients of one room, keyed by account ID.
pub type ClientList<C> = Registry<Client<C>>;

/// Every room on the server, keyed by room ID.
pub type RoomList<C> = Registry<Room<C>>;

/// ID (and name) of the room every server starts with.
pub const DEFAULT_ROOM_ID: &str = "ALL";

/// A chat room.
pub struct Room<C: Connection> {
    id: Id,
    name: String,
    owner: Option<Account>,
    clients: ClientList<C>,
}

impl<C: Connection> std::fmt::Debug for Room<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Room<C> {
    /// Creates a room with a fresh random ID.
    pub fn new(name: impl Into<String>, owner: Account) -> Self {
        Self {
            id: Id::generate(ROOM_ID_LEN),
            name: name.into(),
            owner: Some(owner),
            clients: ClientList::new(),
        }
    }

    /// The ownerless default room.
    pub fn default_room() -> Self {
        Self::with_id(Id::new(DEFAULT_ROOM_ID), DEFAULT_ROOM_ID)
    }

    /// Creates an ownerless room with a fixed ID.
    pub fn with_id(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: None,
            clients: ClientList::new(),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<&Account> {
        self.owner.as_ref()
    }

    pub fn clients(&self) -> &ClientList<C> {
        &self.clients
    }

    /// The `{id, name}` reference stamped onto messages in this room.
    pub fn chat_room(&self) -> ChatRoom {
        ChatRoom::new(self.id.clone(), self.name.clone())
    }

    /// Adds `client` and announces it to every member, the newcomer
    /// included.
    pub async fn add_client(&self, client: Arc<Client<C>>) -> Result<(), RoomError> {
        client.enter_room(self.id.clone()).await;
        let notice = format!("{} ({}) joined the chat", client.username(), client.id());
        let client_id = client.id().clone();
        self.clients.add(client).await;

        tracing::info!(room_id = %self.id, %client_id, "client joined room");
        self.broadcast(&ChatMessage::server_notice(notice, self.chat_room()))
            .await?;
        Ok(())
    }

    /// Removes a client and announces its departure to those who remain.
    ///
    /// Returns the removed client, or `None` (and sends nothing) if it was
    /// not a member.
    pub async fn remove_client(
        &self,
        client_id: &Id,
    ) -> Result<Option<Arc<Client<C>>>, RoomError> {
        let Some(client) = self.clients.remove(client_id).await else {
            return Ok(None);
        };

        tracing::info!(room_id = %self.id, %client_id, "client left room");
        let notice = format!("{} ({}) left the chat", client.username(), client.id());
        self.broadcast(&ChatMessage::server_notice(notice, self.chat_room()))
            .await?;
        Ok(Some(client))
    }

    /// Sends `msg` to every current member.
    ///
    /// The message is encoded once. A failed write to one member is logged
    /// and skipped; it never stops delivery to the others. Returns how many
    /// members the message reached.
    ///
    /// # Errors
    /// [`RoomError::Protocol`] if the message cannot be encoded; nothing is
    /// sent in that case.
    pub async fn broadcast(&self, msg: &ChatMessage) -> Result<usize, RoomError> {
        let frame = msg.to_packet()?.encode();
        let mut delivered = 0;

        for client in self.clients.list().await {
            match client.connection().write(&frame).await {
                Ok(()) => delivered += 1,
                Err(e) if e.is_connection_closed() => {
                    tracing::debug!(
                        room_id = %self.id,
                        client_id = %client.id(),
                        "skipping closed connection"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        room_id = %self.id,
                        client_id = %client.id(),
                        error = %e,
                        "failed to deliver message"
                    );
                }
            }
        }
        Ok(delivered)
    }

    /// Current members, earliest joiner first.
    pub async fn members_by_join_time(&self) -> Vec<Arc<Client<C>>> {
        let mut members = Vec::new();
        for client in self.clients.list().await {
            members.push((client.joined_at().await, client));
        }
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members.into_iter().map(|(_, client)| client).collect()
    }
}

impl<C: Connection> Keyed for Room<C> {
    fn key(&self) -> &Id {
        &self.id
    }
}

/// Moves `client` into the room `target`.
///
/// The move is two-phase (leave the current room, then join the target)
/// and holds the client's membership lock throughout, so concurrent moves
/// of the same client are applied one after the other.
///
/// # Errors
/// - [`RoomError::NotFound`] if `target` is not registered.
/// - [`RoomError::AlreadyInRoom`] if the client is already there.
pub async fn move_client<C: Connection>(
    rooms: &RoomList<C>,
    client: &Arc<Client<C>>,
    target: &Id,
) -> Result<Arc<Room<C>>, RoomError> {
    let to = rooms
        .find(target)
        .await
        .ok_or_else(|| RoomError::NotFound(target.clone()))?;

    let _guard = client.lock_membership().await;
    let current = client.room_id().await;
    if current == *target {
        return Err(RoomError::AlreadyInRoom(to.name().to_string()));
    }

    if let Some(from) = rooms.find(&current).await {
        from.remove_client(client.id()).await?;
    }
    to.add_client(Arc::clone(client)).await?;
    Ok(to)
}
