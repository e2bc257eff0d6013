//! Integration tests for the Roomcast server: the full connection
//! lifecycle, room broadcast, and commands.
//!
//! Most tests run over the in-memory transport so they exercise every
//! layer above the socket deterministically. One test goes over a real
//! WebSocket to check the wire format end to end.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use roomcast::prelude::*;
use roomcast_transport::{MemoryConnection, memory};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

/// How long a test waits for a frame before giving up.
const WAIT: Duration = Duration::from_secs(2);

/// Starts a server over an in-memory transport.
async fn start_server(
    builder: ChatServerBuilder,
) -> (MemoryConnector, Arc<RoomList<MemoryConnection>>) {
    let (transport, connector) = memory::transport();
    let server = builder.with_transport(transport).await;
    let rooms = server.rooms();
    tokio::spawn(server.run());
    (connector, rooms)
}

async fn start_default_server() -> (MemoryConnector, Arc<RoomList<MemoryConnection>>) {
    start_server(ChatServerBuilder::new()).await
}

/// The client side of one connection.
struct Peer {
    inner: MemoryPeer,
}

impl Peer {
    fn connect(connector: &MemoryConnector) -> Self {
        Self {
            inner: connector.connect().expect("server should accept"),
        }
    }

    fn send_packet(&self, packet: &Packet) {
        self.inner.send_binary(packet.encode()).expect("send");
    }

    fn send<P: PacketPayload>(&self, payload: &P) {
        self.send_packet(&payload.to_packet().expect("encode"));
    }

    fn say(&self, content: &str) {
        self.send(&chat(content, false));
    }

    fn command(&self, content: &str) {
        self.send(&chat(content, true));
    }

    async fn next_packet(&mut self) -> Packet {
        let frame = timeout(WAIT, self.inner.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed");
        Packet::decode(&frame).expect("valid packet")
    }

    async fn next_chat(&mut self) -> ChatMessage {
        ChatMessage::from_packet(&self.next_packet().await).expect("chat message")
    }

    /// Waits until the server closes the connection, skipping any frames
    /// still queued. Returns `false` if it stays open.
    async fn wait_closed(&mut self) -> bool {
        loop {
            match timeout(WAIT, self.inner.recv()).await {
                Ok(None) => return true,
                Ok(Some(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}

fn chat(content: &str, is_command: bool) -> ChatMessage {
    let mut msg = ChatMessage::new(Account::default(), content, ChatRoom::default(), Utc::now());
    msg.is_command = is_command;
    msg
}

/// Sends `auth` and returns the server's answer.
async fn authenticate(connector: &MemoryConnector, auth: ClientAuth) -> (Peer, ServerAuth) {
    let mut peer = Peer::connect(connector);
    peer.send(&auth);
    let reply = ServerAuth::from_packet(&peer.next_packet().await).expect("auth reply");
    (peer, reply)
}

/// Logs in and consumes the client's own join notice.
async fn login(connector: &MemoryConnector, username: &str) -> (Peer, Account) {
    let (mut peer, reply) = authenticate(connector, ClientAuth::new(username)).await;
    assert_eq!(reply.status, AuthStatus::Ok, "auth failed: {}", reply.content);
    let account = reply.account.expect("account in auth reply");

    let notice = peer.next_chat().await;
    assert_eq!(notice.content, joined(&account));
    (peer, account)
}

fn joined(account: &Account) -> String {
    format!("{} ({}) joined the chat", account.username, account.id)
}

fn left(account: &Account) -> String {
    format!("{} ({}) left the chat", account.username, account.id)
}

/// Extracts the room ID from a `new` reply.
fn created_room_id(reply: &ChatMessage) -> Id {
    let first_line = reply.content.lines().next().expect("reply line");
    let (_, id) = first_line.split_once(" with id ").expect("room id in reply");
    Id::new(id)
}

// =========================================================================
// Auth
// =========================================================================

#[tokio::test]
async fn test_auth_success_joins_default_room() {
    let (connector, rooms) = start_default_server().await;
    let (mut peer, reply) = authenticate(&connector, ClientAuth::new("alice")).await;

    assert_eq!(reply.status, AuthStatus::Ok);
    assert_eq!(reply.content, "account authenticated");
    assert_eq!(reply.room_id, Id::new("ALL"));
    let account = reply.account.unwrap();
    assert_eq!(account.username, "alice");
    assert_eq!(account.id.as_str().len(), 8);

    let notice = peer.next_chat().await;
    assert!(notice.is_server);
    assert_eq!(notice.author.username, "SERVER");
    assert_eq!(notice.content, joined(&account));

    let all = rooms.find(&Id::new("ALL")).await.unwrap();
    assert!(all.clients().has(&account.id).await);
}

#[tokio::test]
async fn test_auth_username_length_bounds() {
    let (connector, _rooms) = start_default_server().await;

    for ok in ["abcd", "abcdefghijklmno", "  padded  "] {
        let (_peer, reply) = authenticate(&connector, ClientAuth::new(ok)).await;
        assert_eq!(reply.status, AuthStatus::Ok, "{ok:?} should be accepted");
        assert_eq!(reply.account.unwrap().username, ok.trim());
    }

    for bad in ["abc", "abcdefghijklmnop", "      "] {
        let (mut peer, reply) = authenticate(&connector, ClientAuth::new(bad)).await;
        assert_eq!(reply.status, AuthStatus::AuthError, "{bad:?} should be rejected");
        assert_eq!(reply.content, "username must be between 4 and 15 characters");
        assert!(reply.account.is_none());
        assert!(peer.wait_closed().await);
    }
}

#[tokio::test]
async fn test_rejected_auth_leaves_no_trace() {
    let (connector, rooms) = start_default_server().await;
    let (mut watcher, _) = login(&connector, "watcher").await;

    let (mut peer, _) = authenticate(&connector, ClientAuth::new("no")).await;
    assert!(peer.wait_closed().await);

    let all = rooms.find(&Id::new("ALL")).await.unwrap();
    assert_eq!(all.clients().len().await, 1);

    // The watcher saw nothing about the rejected client.
    watcher.say("still alone");
    assert_eq!(watcher.next_chat().await.content, "still alone");
}

#[tokio::test]
async fn test_first_packet_must_be_auth() {
    let (connector, _rooms) = start_default_server().await;
    let mut peer = Peer::connect(&connector);
    peer.say("hello?");

    let reply = ServerAuth::from_packet(&peer.next_packet().await).unwrap();
    assert_eq!(reply.status, AuthStatus::AuthError);
    assert_eq!(reply.content, "expected auth packet");
    assert!(peer.wait_closed().await);
}

#[tokio::test]
async fn test_version_mismatch_before_auth_gets_no_reply() {
    let (connector, rooms) = start_default_server().await;
    let mut peer = Peer::connect(&connector);
    peer.inner.send_binary(vec![2, 1, 0, 0]).unwrap();

    let frame = timeout(WAIT, peer.inner.recv())
        .await
        .expect("server should close the connection");
    assert_eq!(frame, None, "a foreign-version peer gets no auth reply");

    let all = rooms.find(&Id::new("ALL")).await.unwrap();
    assert!(all.clients().is_empty().await);
}

#[tokio::test]
async fn test_auth_into_requested_room() {
    let (connector, _rooms) = start_default_server().await;
    let (mut owner, _) = login(&connector, "owner").await;
    owner.command("new side");
    let side = created_room_id(&owner.next_chat().await);

    let (mut peer, reply) =
        authenticate(&connector, ClientAuth::new("guest").with_room(side.clone())).await;
    assert_eq!(reply.room_id, side);
    let notice = peer.next_chat().await;
    assert_eq!(notice.room.id, side);
    assert_eq!(notice.room.name, "side");
}

#[tokio::test]
async fn test_auth_into_unknown_room_falls_back_to_default() {
    let (connector, _rooms) = start_default_server().await;
    let (_peer, reply) =
        authenticate(&connector, ClientAuth::new("guest").with_room(Id::new("missing"))).await;
    assert_eq!(reply.status, AuthStatus::Ok);
    assert_eq!(reply.room_id, Id::new("ALL"));
}

// =========================================================================
// Broadcast
// =========================================================================

#[tokio::test]
async fn test_join_notice_once_and_same_room_fanout() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;
    let (mut bob, bob_account) = login(&connector, "bobby").await;

    assert_eq!(alice.next_chat().await.content, joined(&bob_account));

    alice.say("hi bob");
    let to_alice = alice.next_chat().await;
    let to_bob = bob.next_chat().await;
    assert_eq!(to_alice.content, "hi bob");
    assert_eq!(to_bob.content, "hi bob");
    assert_eq!(to_bob.author.username, "alice");
    assert_eq!(to_bob.room.id, Id::new("ALL"));
    assert!(!to_bob.is_server && !to_bob.is_command);
}

#[tokio::test]
async fn test_server_restamps_client_messages() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, alice_account) = login(&connector, "alice").await;

    let mut forged = chat("forged", false);
    forged.id = Id::new("client-chosen-id");
    forged.author = Account::server();
    forged.is_server = true;
    forged.created_at = "2001-01-01T00:00:00Z".parse().unwrap();
    alice.send(&forged);

    let received = alice.next_chat().await;
    assert_eq!(received.content, "forged");
    assert_eq!(received.author, alice_account);
    assert!(!received.is_server);
    assert_ne!(received.id, Id::new("client-chosen-id"));
    assert_eq!(received.id.as_str().len(), 22);
    assert!(received.created_at > forged.created_at);
}

#[tokio::test]
async fn test_content_length_bounds() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    alice.say("");
    alice.say(&"x".repeat(101));
    alice.say("y");
    assert_eq!(alice.next_chat().await.content, "y");

    let hundred = "z".repeat(100);
    alice.say(&hundred);
    assert_eq!(alice.next_chat().await.content, hundred);
}

#[tokio::test]
async fn test_leave_notice_on_disconnect() {
    let (connector, rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;
    let (bob, bob_account) = login(&connector, "bobby").await;
    assert_eq!(alice.next_chat().await.content, joined(&bob_account));

    bob.inner.close().unwrap();
    assert_eq!(alice.next_chat().await.content, left(&bob_account));

    let all = rooms.find(&Id::new("ALL")).await.unwrap();
    assert!(!all.clients().has(&bob_account.id).await);

    alice.say("bye");
    assert_eq!(alice.next_chat().await.content, "bye");
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, alice_account) = login(&connector, "alice").await;
    let (mut bob, bob_account) = login(&connector, "bobby").await;
    assert_eq!(alice.next_chat().await.content, joined(&bob_account));

    alice.command("new side");
    let reply = alice.next_chat().await;
    let side = created_room_id(&reply);
    assert_eq!(
        reply.content,
        format!("room side created with id {side}\nuse: join {side}")
    );

    alice.command(&format!("join {side}"));
    let notice = alice.next_chat().await;
    assert_eq!(notice.content, joined(&alice_account));
    assert_eq!(notice.room.id, side);
    assert_eq!(bob.next_chat().await.content, left(&alice_account));

    alice.say("secret");
    assert_eq!(alice.next_chat().await.content, "secret");

    bob.say("public");
    assert_eq!(bob.next_chat().await.content, "public");

    alice.say("again");
    assert_eq!(alice.next_chat().await.content, "again");
}

// =========================================================================
// Packets in the active state
// =========================================================================

#[tokio::test]
async fn test_ping_packet_gets_pong() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    alice.send_packet(&Packet::ping());
    let pong = alice.next_packet().await;
    assert_eq!(pong.packet_type(), PacketType::Pong);
    assert!(pong.payload().is_empty());
}

#[tokio::test]
async fn test_auth_packet_after_login_is_ignored() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    alice.send(&ClientAuth::new("mallory"));
    alice.send_packet(&Packet::pong());
    alice.say("still alice");

    let msg = alice.next_chat().await;
    assert_eq!(msg.content, "still alice");
    assert_eq!(msg.author.username, "alice");
}

#[tokio::test]
async fn test_version_mismatch_ends_connection() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;
    let (mut bob, bob_account) = login(&connector, "bobby").await;
    assert_eq!(alice.next_chat().await.content, joined(&bob_account));

    bob.inner.send_binary(vec![2, 1, 0, 0]).unwrap();
    assert!(bob.wait_closed().await);
    assert_eq!(alice.next_chat().await.content, left(&bob_account));
}

#[tokio::test]
async fn test_text_frame_ends_connection() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    alice.inner.send_text("not binary").unwrap();
    assert!(alice.wait_closed().await);
}

#[tokio::test]
async fn test_malformed_chat_payload_is_skipped() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    alice.send_packet(&Packet::new(PacketType::Message, b"{not json".to_vec()).unwrap());
    alice.say("after");
    assert_eq!(alice.next_chat().await.content, "after");
}

#[tokio::test(start_paused = true)]
async fn test_idle_connection_times_out() {
    let (connector, _rooms) =
        start_server(ChatServerBuilder::new().keepalive(Duration::from_secs(5))).await;
    let (mut alice, _) = login(&connector, "alice").await;
    let (mut bob, bob_account) = login(&connector, "bobby").await;
    assert_eq!(alice.next_chat().await.content, joined(&bob_account));

    // Keep alice alive with transport heartbeats while bob goes quiet.
    let started = tokio::time::Instant::now();
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        alice.inner.ping().unwrap();
    }

    assert!(bob.wait_closed().await);
    assert!(started.elapsed() >= Duration::from_secs(5));
    // Without the heartbeats alice would have timed out alongside bob.
    assert_eq!(alice.next_chat().await.content, left(&bob_account));
}

#[tokio::test(start_paused = true)]
async fn test_ping_packet_and_client_ping_keep_connection_alive() {
    let (connector, _rooms) =
        start_server(ChatServerBuilder::new().keepalive(Duration::from_secs(5))).await;
    let (mut alice, _) = login(&connector, "alice").await;
    let (mut bob, bob_account) = login(&connector, "bobby").await;
    let (mut carol, carol_account) = login(&connector, "carol").await;
    assert_eq!(alice.next_chat().await.content, joined(&bob_account));
    assert_eq!(alice.next_chat().await.content, joined(&carol_account));

    // alice sends Ping packets, carol the client-ping command, bob nothing.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        alice.send_packet(&Packet::ping());
        carol.command("client-ping");
    }

    assert!(bob.wait_closed().await);

    // alice's Pongs and the leave notice interleave; sort them out.
    let mut pongs = 0;
    let mut notices = Vec::new();
    while pongs < 4 || notices.is_empty() {
        let packet = alice.next_packet().await;
        match packet.packet_type() {
            PacketType::Pong => pongs += 1,
            PacketType::Message => {
                notices.push(ChatMessage::from_packet(&packet).unwrap().content);
            }
            other => panic!("unexpected {other:?} packet"),
        }
    }
    assert_eq!(notices, vec![left(&bob_account)]);
    assert_eq!(carol.next_chat().await.content, left(&bob_account));

    alice.say("still here");
    assert_eq!(alice.next_chat().await.content, "still here");
    assert_eq!(carol.next_chat().await.content, "still here");
}

#[tokio::test]
async fn test_run_until_stops_accepting() {
    let (transport, connector) = memory::transport();
    let server = ChatServerBuilder::new().with_transport(transport).await;
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server_task = tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));

    let (mut alice, _) = login(&connector, "alice").await;

    stop.send(()).unwrap();
    timeout(WAIT, server_task)
        .await
        .expect("server should stop")
        .unwrap()
        .expect("clean shutdown");
    assert!(connector.connect().is_err(), "no new connections after shutdown");

    // The connection accepted before shutdown keeps working.
    alice.say("after shutdown");
    assert_eq!(alice.next_chat().await.content, "after shutdown");
}

// =========================================================================
// Commands
// =========================================================================

#[tokio::test]
async fn test_ping_command_replies_with_original_timestamp() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    let sent_at: DateTime<Utc> = "2024-01-02T03:04:05Z".parse().unwrap();
    let mut ping = chat("ping", true);
    ping.created_at = sent_at;
    alice.send(&ping);

    let reply = alice.next_chat().await;
    assert_eq!(reply.content, "Pong!");
    assert_eq!(reply.created_at, sent_at);
    assert!(reply.is_command);
    assert_eq!(reply.author.username, "COMMAND");
    assert_eq!(reply.room.id, Id::new("COMMAND_RESPONSE"));
    assert_eq!(reply.room.name, "Command Response");
}

#[tokio::test]
async fn test_commands_are_never_broadcast() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;
    let (mut bob, bob_account) = login(&connector, "bobby").await;
    assert_eq!(alice.next_chat().await.content, joined(&bob_account));

    bob.command("ping");
    bob.command("client-ping");
    bob.command("nonsense");
    assert_eq!(bob.next_chat().await.content, "Pong!");
    assert_eq!(bob.next_chat().await.content, "command not found");

    // alice's next frame is her own message, not any of bob's commands.
    alice.say("marker");
    assert_eq!(alice.next_chat().await.content, "marker");
}

#[tokio::test]
async fn test_unknown_command_and_prefix_match() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    alice.command("pingpong");
    assert_eq!(alice.next_chat().await.content, "command not found");
}

#[tokio::test]
async fn test_ls_lists_room_in_join_order() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, alice_account) = login(&connector, "alice").await;
    let (mut bob, bob_account) = login(&connector, "bobby").await;
    let (mut carol, carol_account) = login(&connector, "carol").await;
    assert_eq!(alice.next_chat().await.content, joined(&bob_account));
    assert_eq!(alice.next_chat().await.content, joined(&carol_account));
    assert_eq!(bob.next_chat().await.content, joined(&carol_account));

    carol.command("ls");
    let reply = carol.next_chat().await;
    let lines: Vec<&str> = reply.content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "==== List of Online Clients ====");
    for (line, account) in lines[1..4].iter().zip([&alice_account, &bob_account, &carol_account]) {
        let prefix = format!(" {} ({}) - ", account.username, account.id);
        assert!(line.starts_with(&prefix), "{line:?} should start with {prefix:?}");
        assert!(line.ends_with(" ago"));
    }
    assert_eq!(lines[4], "================================");

    alice.say("marker");
    assert_eq!(alice.next_chat().await.content, "marker");
    assert_eq!(bob.next_chat().await.content, "marker");
}

#[tokio::test]
async fn test_join_errors() {
    let (connector, _rooms) = start_default_server().await;
    let (mut alice, _) = login(&connector, "alice").await;

    alice.command("join nope");
    assert_eq!(alice.next_chat().await.content, "room nope not found");

    alice.command("join ALL");
    assert_eq!(alice.next_chat().await.content, "you are already in room ALL");

    alice.command("join");
    assert_eq!(alice.next_chat().await.content, "usage: join <roomID>");

    alice.command("new");
    assert_eq!(alice.next_chat().await.content, "usage: new <name>");
}

#[tokio::test]
async fn test_new_room_is_registered_with_owner() {
    let (connector, rooms) = start_default_server().await;
    let (mut alice, alice_account) = login(&connector, "alice").await;

    alice.command("new book club");
    let id = created_room_id(&alice.next_chat().await);

    let room = rooms.find(&id).await.expect("room registered");
    assert_eq!(room.name(), "book club");
    assert_eq!(room.owner(), Some(&alice_account));
    assert_eq!(id.as_str().len(), 22);
    // Creating a room does not move its creator.
    assert!(room.clients().is_empty().await);
}

// =========================================================================
// Over a real WebSocket
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Reads frames until a binary one arrives and decodes it.
async fn next_ws_packet(ws: &mut ClientWs) -> Packet {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Binary(data) = msg {
            return Packet::decode(&data).expect("valid packet");
        }
    }
}

#[tokio::test]
async fn test_idle_tcp_peer_does_not_block_other_clients() {
    let server = ChatServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr();
    tokio::spawn(server.run());

    // Opens TCP but never sends the upgrade request.
    let _idle = tokio::net::TcpStream::connect(addr).await.expect("tcp connect");

    let (mut ws, _) = timeout(WAIT, tokio_tungstenite::connect_async(format!("ws://{addr}/lc")))
        .await
        .expect("accept loop stalled behind the idle peer")
        .expect("should connect");

    let auth = ClientAuth::new("alice").to_packet().unwrap().encode();
    ws.send(Message::Binary(auth.into())).await.unwrap();
    let reply = ServerAuth::from_packet(&next_ws_packet(&mut ws).await).unwrap();
    assert_eq!(reply.status, AuthStatus::Ok);
}

#[tokio::test]
async fn test_websocket_auth_and_wire_format() {
    let server = ChatServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr();
    tokio::spawn(server.run());

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/lc"))
        .await
        .expect("should connect");

    let auth = ClientAuth::new("alice").to_packet().unwrap().encode();
    ws.send(Message::Binary(auth.into())).await.unwrap();

    let reply = next_ws_packet(&mut ws).await;
    assert_eq!(reply.packet_type(), PacketType::Auth);
    let json: serde_json::Value = serde_json::from_slice(reply.payload()).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["content"], "account authenticated");
    assert_eq!(json["room_id"], "ALL");
    assert_eq!(json["account"]["username"], "alice");
    assert_eq!(json["account"]["id"].as_str().unwrap().len(), 8);

    let notice = next_ws_packet(&mut ws).await;
    assert_eq!(notice.packet_type(), PacketType::Message);
    let json: serde_json::Value = serde_json::from_slice(notice.payload()).unwrap();
    assert_eq!(json["is_server"], true);
    assert_eq!(json["is_command"], false);
    assert_eq!(json["room"]["id"], "ALL");
    assert_eq!(json["author"]["id"], "SERVER");
    assert!(json["created_at"].is_string());
}
