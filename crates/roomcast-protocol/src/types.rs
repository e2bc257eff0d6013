//! Typed payloads carried inside packets.
//!
//! Each message knows which [`PacketType`] it travels as (via
//! [`PacketPayload`]) and is serialized to JSON with [`JsonCodec`]. The
//! field names below are the wire schema: clients written in any language
//! rely on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use crate::id::{ACCOUNT_ID_LEN, Id, MESSAGE_ID_LEN};
use crate::{Codec, JsonCodec, Packet, PacketType, ProtocolError};

// ---------------------------------------------------------------------------
// PacketPayload
// ---------------------------------------------------------------------------

/// A message that travels as the payload of one packet type.
pub trait PacketPayload: Serialize + DeserializeOwned {
    /// The packet type tag this message is sent under.
    const PACKET_TYPE: PacketType;

    /// Encodes the message and frames it as a packet.
    fn to_packet(&self) -> Result<Packet, ProtocolError> {
        Packet::new(Self::PACKET_TYPE, JsonCodec.encode(self)?)
    }

    /// Parses the message out of a packet.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedPacketType`] if the packet is of another
    /// type, [`ProtocolError::Decode`] if the payload does not match.
    fn from_packet(packet: &Packet) -> Result<Self, ProtocolError> {
        if packet.packet_type() != Self::PACKET_TYPE {
            return Err(ProtocolError::UnexpectedPacketType {
                expected: Self::PACKET_TYPE,
                found: packet.packet_type(),
            });
        }
        JsonCodec.decode(packet.payload())
    }
}

/// Deserializes `null` as the type's default. Older clients send
/// `"author": null` for messages they have not stamped.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// The identity a participant chats under.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub username: String,
}

impl Account {
    /// Username given to a connection before it authenticates.
    pub const ANONYMOUS: &'static str = "Anonymous";

    /// Creates an account with a freshly generated ID.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Id::generate(ACCOUNT_ID_LEN),
            username: username.into(),
        }
    }

    /// A placeholder account for an unauthenticated connection.
    pub fn anonymous() -> Self {
        Self::new(Self::ANONYMOUS)
    }

    /// The pseudo-account that authors join/leave notices.
    pub fn server() -> Self {
        Self {
            id: Id::new("SERVER"),
            username: "SERVER".to_string(),
        }
    }

    /// The pseudo-account that authors command replies.
    pub fn command() -> Self {
        Self {
            id: Id::new("COMMAND"),
            username: "COMMAND".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// The room reference embedded in every chat message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: Id,
    pub name: String,
}

impl ChatRoom {
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The pseudo-room command replies are addressed from.
    pub fn command_response() -> Self {
        Self::new(Id::new("COMMAND_RESPONSE"), "Command Response")
    }
}

/// A posted message, either from a participant or synthesized by the
/// server.
///
/// Only `content` is required when parsing: the server restamps every
/// client message before it is broadcast, so the other fields are taken
/// as hints at most.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Id,
    #[serde(default)]
    pub is_server: bool,
    #[serde(default)]
    pub is_command: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub room: ChatRoom,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: Account,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Smallest accepted content length, in characters.
    pub const MIN_CONTENT_CHARS: usize = 1;
    /// Largest accepted content length, in characters.
    pub const MAX_CONTENT_CHARS: usize = 100;

    /// A participant message with a fresh ID.
    pub fn new(
        author: Account,
        content: impl Into<String>,
        room: ChatRoom,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Id::generate(MESSAGE_ID_LEN),
            is_server: false,
            is_command: false,
            room,
            author,
            content: content.into(),
            created_at,
        }
    }

    /// A server-authored notice (join/leave) for `room`, stamped now.
    pub fn server_notice(content: impl Into<String>, room: ChatRoom) -> Self {
        Self {
            is_server: true,
            ..Self::new(Account::server(), content, room, Utc::now())
        }
    }

    /// A reply to a command invocation.
    pub fn command_reply(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            is_command: true,
            ..Self::new(
                Account::command(),
                content,
                ChatRoom::command_response(),
                created_at,
            )
        }
    }

    /// Returns `true` if the content length is within the accepted range.
    pub fn has_valid_content(&self) -> bool {
        let chars = self.content.chars().count();
        (Self::MIN_CONTENT_CHARS..=Self::MAX_CONTENT_CHARS).contains(&chars)
    }
}

impl PacketPayload for ChatMessage {
    const PACKET_TYPE: PacketType = PacketType::Message;
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Client → Server: the first packet on every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAuth {
    pub username: String,
    /// Room to join. Unknown or empty IDs fall back to the default room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Id>,
}

impl ClientAuth {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            room_id: None,
        }
    }

    pub fn with_room(mut self, room_id: Id) -> Self {
        self.room_id = Some(room_id);
        self
    }
}

impl PacketPayload for ClientAuth {
    const PACKET_TYPE: PacketType = PacketType::Auth;
}

/// Outcome of an auth attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Ok,
    AuthError,
}

/// Server → Client: the answer to [`ClientAuth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAuth {
    pub status: AuthStatus,
    pub content: String,
    #[serde(default)]
    pub room_id: Id,
    #[serde(default)]
    pub account: Option<Account>,
}

impl ServerAuth {
    /// A successful auth: the client is now a member of `room_id`.
    pub fn ok(room_id: Id, account: Account) -> Self {
        Self {
            status: AuthStatus::Ok,
            content: "account authenticated".to_string(),
            room_id,
            account: Some(account),
        }
    }

    /// A failed auth; the server closes the connection after sending it.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::AuthError,
            content: content.into(),
            room_id: Id::default(),
            account: None,
        }
    }
}

impl PacketPayload for ServerAuth {
    const PACKET_TYPE: PacketType = PacketType::Auth;
}
