//! In-chat commands.
//!
//! A chat message with `is_command` set never reaches the room. Its
//! content is parsed once into a [`Command`] and executed against the
//! shared registries; whatever it produces is sent back to the invoking
//! connection alone.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use roomcast_protocol::{ChatMessage, Id, PacketPayload};
use roomcast_room::{Client, Room, move_client};
use roomcast_session::Authenticator;
use roomcast_transport::Connection;

use crate::server::ServerState;

/// First line of the `ls` reply.
const LIST_HEADER: &str = "==== List of Online Clients ====";
/// Last line of the `ls` reply.
const LIST_FOOTER: &str = "================================";

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ls`: who is in my room.
    List,
    /// `ping`: answer "Pong!".
    Ping,
    /// `client-ping`: refresh liveness, no reply.
    ClientPing,
    /// `join <roomID>`: move to another room.
    Join(Id),
    /// `new <name>`: create a room.
    New(String),
    /// A known verb with missing arguments; carries the usage line.
    Usage(&'static str),
    /// Anything else.
    Unknown,
}

impl Command {
    /// Parses command text. The verb is the first whitespace-separated
    /// token and must match exactly; the rest is the argument.
    pub fn parse(content: &str) -> Self {
        let content = content.trim();
        let (verb, arg) = match content.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (content, ""),
        };

        match verb {
            "ls" => Self::List,
            "ping" => Self::Ping,
            "client-ping" => Self::ClientPing,
            "join" => match arg.split_whitespace().next() {
                Some(room_id) => Self::Join(Id::new(room_id)),
                None => Self::Usage("usage: join <roomID>"),
            },
            "new" if arg.is_empty() => Self::Usage("usage: new <name>"),
            "new" => Self::New(arg.to_string()),
            _ => Self::Unknown,
        }
    }
}

/// Parses and runs the command in `msg` on behalf of `client`.
pub(crate) async fn dispatch<A, C>(
    client: &Arc<Client<C>>,
    msg: &ChatMessage,
    state: &ServerState<A, C>,
) where
    A: Authenticator,
    C: Connection,
{
    let command = Command::parse(&msg.content);
    tracing::debug!(client_id = %client.id(), ?command, "running command");

    let reply = match command {
        Command::List => list(client, state).await,
        Command::Ping => Some(ChatMessage::command_reply("Pong!", msg.created_at)),
        Command::ClientPing => {
            client.connection().ping();
            None
        }
        Command::Join(room_id) => join(client, &room_id, state).await,
        Command::New(name) => Some(create_room(client, name, state).await),
        Command::Usage(usage) => Some(ChatMessage::command_reply(usage, Utc::now())),
        Command::Unknown => {
            Some(ChatMessage::command_reply("command not found", Utc::now()))
        }
    };

    if let Some(reply) = reply {
        send_reply(client, &reply).await;
    }
}

async fn list<A, C>(client: &Arc<Client<C>>, state: &ServerState<A, C>) -> Option<ChatMessage>
where
    A: Authenticator,
    C: Connection,
{
    let room_id = client.room_id().await;
    let Some(room) = state.rooms.find(&room_id).await else {
        tracing::debug!(client_id = %client.id(), %room_id, "ls from a client without a room");
        return None;
    };

    let now = Utc::now();
    let mut lines = vec![LIST_HEADER.to_string()];
    for member in room.members_by_join_time().await {
        let joined_at = member.joined_at().await;
        lines.push(format!(
            " {} ({}) - {}",
            member.username(),
            member.id(),
            format_elapsed(since(joined_at, now))
        ));
    }
    lines.push(LIST_FOOTER.to_string());

    Some(ChatMessage::command_reply(lines.join("\n"), now))
}

/// Moves the client. Success needs no reply: the new room's join notice
/// reaches the client like everyone else.
async fn join<A, C>(
    client: &Arc<Client<C>>,
    room_id: &Id,
    state: &ServerState<A, C>,
) -> Option<ChatMessage>
where
    A: Authenticator,
    C: Connection,
{
    match move_client(&state.rooms, client, room_id).await {
        Ok(_) => {
            tracing::info!(client_id = %client.id(), %room_id, "client switched rooms");
            None
        }
        Err(e) => Some(ChatMessage::command_reply(e.to_string(), Utc::now())),
    }
}

async fn create_room<A, C>(
    client: &Arc<Client<C>>,
    name: String,
    state: &ServerState<A, C>,
) -> ChatMessage
where
    A: Authenticator,
    C: Connection,
{
    let room = Arc::new(Room::new(name, client.account().clone()));
    let reply = format!(
        "room {} created with id {}\nuse: join {}",
        room.name(),
        room.id(),
        room.id()
    );
    tracing::info!(
        client_id = %client.id(),
        room_id = %room.id(),
        name = room.name(),
        "room created"
    );
    state.rooms.add(room).await;
    ChatMessage::command_reply(reply, Utc::now())
}

async fn send_reply<C: Connection>(client: &Client<C>, reply: &ChatMessage) {
    let result = match reply.to_packet() {
        Ok(packet) => client.connection().write_packet(&packet).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        tracing::debug!(client_id = %client.id(), error = %e, "failed to send command reply");
    }
}

fn since(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or_default()
}

/// Renders a past duration as the largest whole unit, e.g.
/// `"2 hours ago"`, `"1 minute ago"`, `"0 seconds ago"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (n, unit) = if secs >= 3600 {
        (secs / 3600, "hour")
    } else if secs >= 60 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    let plural = if n == 1 { "" } else { "s" };
    format!("{n} {unit}{plural} ago")
}
