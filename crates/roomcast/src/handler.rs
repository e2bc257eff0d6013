//! Per-connection handler: auth, message routing, and teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! which is the only reader of that connection. The flow is:
//!   1. Connected: wrap the transport, create an anonymous account
//!   2. Authenticated: read one Auth packet, validate, pick a room
//!   3. Active: loop over packets → pings, chat, commands
//!   4. Closed: leave the room, close the transport

use std::sync::Arc;

use chrono::Utc;
use roomcast_protocol::{
    Account, ChatMessage, ClientAuth, Packet, PacketPayload, PacketType, ProtocolError, ServerAuth,
};
use roomcast_room::{Client, Room};
use roomcast_session::{Authenticator, ClientConnection, SessionError};
use roomcast_transport::Connection;

use crate::commands;
use crate::server::ServerState;
use crate::RoomcastError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(conn: C, state: Arc<ServerState<A, C>>)
where
    A: Authenticator,
    C: Connection,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let connection = ClientConnection::new(conn, state.keepalive);
    let account = Account::anonymous();

    let client = match handle_auth(connection, account, &state).await {
        Ok(client) => client,
        Err(e) if e.is_connection_closed() => {
            tracing::debug!(%conn_id, "connection closed during auth");
            return;
        }
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "auth failed");
            return;
        }
    };

    handle_incoming_messages(&client, &state).await;
    disconnect(&client, &state).await;
}

/// Runs the auth handshake and admits the client to its room.
///
/// Owns the connection until it succeeds. On failure, the client is sent
/// an `auth_error` response (unless the connection is already gone) and
/// the connection is closed; no shared state has been touched.
async fn handle_auth<A, C>(
    connection: ClientConnection<C>,
    mut account: Account,
    state: &ServerState<A, C>,
) -> Result<Arc<Client<C>>, RoomcastError>
where
    A: Authenticator,
    C: Connection,
{
    let room = match authenticate(&connection, &mut account, state).await {
        Ok(room) => room,
        Err(e) => {
            if !e.is_connection_closed() && !is_version_mismatch(&e) {
                let reason = match &e {
                    SessionError::AuthFailed(reason) => reason.clone(),
                    other => other.to_string(),
                };
                if let Ok(packet) = ServerAuth::error(reason).to_packet() {
                    let _ = connection.write_packet(&packet).await;
                }
            }
            let _ = connection.close().await;
            return Err(e.into());
        }
    };

    let reply = ServerAuth::ok(room.id().clone(), account.clone()).to_packet()?;
    let client = Arc::new(Client::new(account, connection));

    if let Err(e) = client.connection().write_packet(&reply).await {
        let _ = client.connection().close().await;
        return Err(e.into());
    }

    tracing::info!(
        client_id = %client.id(),
        username = client.username(),
        room_id = %room.id(),
        "client authenticated"
    );
    room.add_client(Arc::clone(&client)).await?;
    Ok(client)
}

/// A peer speaking another protocol version cannot read our reply either.
fn is_version_mismatch(err: &SessionError) -> bool {
    matches!(
        err,
        SessionError::Protocol(ProtocolError::VersionMismatch { .. })
    )
}

/// Reads the auth packet, fills in the account, and resolves the room.
async fn authenticate<A, C>(
    connection: &ClientConnection<C>,
    account: &mut Account,
    state: &ServerState<A, C>,
) -> Result<Arc<Room<C>>, SessionError>
where
    A: Authenticator,
    C: Connection,
{
    let packet = connection.read_packet().await?;
    if packet.packet_type() != PacketType::Auth {
        return Err(SessionError::AuthFailed("expected auth packet".into()));
    }
    let auth = ClientAuth::from_packet(&packet)?;
    account.username = state.auth.authenticate(&auth).await?;

    let requested = match auth.room_id.as_ref().filter(|id| !id.is_empty()) {
        Some(id) => state.rooms.find(id).await,
        None => None,
    };
    Ok(requested.unwrap_or_else(|| Arc::clone(&state.default_room)))
}

/// The active phase: reads packets until the connection ends.
async fn handle_incoming_messages<A, C>(client: &Arc<Client<C>>, state: &ServerState<A, C>)
where
    A: Authenticator,
    C: Connection,
{
    let client_id = client.id();

    loop {
        let packet = match client.connection().read_packet().await {
            Ok(packet) => packet,
            Err(SessionError::ConnectionClosed) => {
                tracing::debug!(%client_id, "connection closed");
                break;
            }
            Err(SessionError::Timeout) => {
                tracing::info!(%client_id, "connection timed out");
                break;
            }
            Err(SessionError::Protocol(e)) if e.is_framing() => {
                tracing::error!(%client_id, error = %e, "unrecoverable framing error");
                break;
            }
            Err(e) => {
                tracing::error!(%client_id, error = %e, "failed to read packet");
                break;
            }
        };

        match packet.packet_type() {
            PacketType::Ping => {
                client.connection().ping();
                if let Err(e) = client.connection().write_packet(&Packet::pong()).await {
                    tracing::debug!(%client_id, error = %e, "failed to answer ping");
                }
            }
            PacketType::Pong => client.connection().ping(),
            PacketType::Auth => {
                tracing::debug!(%client_id, "ignoring auth packet from active client");
            }
            PacketType::Message => handle_chat_message(client, &packet, state).await,
        }
    }
}

/// Routes one Message packet: to the command dispatcher, or to the
/// client's room.
async fn handle_chat_message<A, C>(
    client: &Arc<Client<C>>,
    packet: &Packet,
    state: &ServerState<A, C>,
) where
    A: Authenticator,
    C: Connection,
{
    let client_id = client.id();
    let msg = match ChatMessage::from_packet(packet) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(%client_id, error = %e, "failed to parse chat message");
            return;
        }
    };

    if !msg.has_valid_content() {
        tracing::debug!(
            %client_id,
            chars = msg.content.chars().count(),
            "dropping message with invalid content length"
        );
        return;
    }

    if msg.is_command {
        commands::dispatch(client, &msg, state).await;
        return;
    }

    let room_id = client.room_id().await;
    let Some(room) = state.rooms.find(&room_id).await else {
        tracing::debug!(%client_id, %room_id, "client's room is gone, dropping message");
        return;
    };

    // Only the content is trusted; everything else is restamped.
    let stamped = ChatMessage::new(
        client.account().clone(),
        msg.content,
        room.chat_room(),
        Utc::now(),
    );
    if let Err(e) = room.broadcast(&stamped).await {
        tracing::warn!(%client_id, %room_id, error = %e, "failed to broadcast message");
    }
}

/// The closed phase: leave the room (announcing it), then close.
async fn disconnect<A, C>(client: &Arc<Client<C>>, state: &ServerState<A, C>)
where
    A: Authenticator,
    C: Connection,
{
    let client_id = client.id();
    {
        let _membership = client.lock_membership().await;
        let room_id = client.room_id().await;
        if let Some(room) = state.rooms.find(&room_id).await {
            if let Err(e) = room.remove_client(client_id).await {
                tracing::warn!(%client_id, %room_id, error = %e, "failed to announce departure");
            }
        }
    }

    if let Err(e) = client.connection().close().await {
        tracing::debug!(%client_id, error = %e, "error closing connection");
    }
    tracing::info!(%client_id, "client disconnected");
}
