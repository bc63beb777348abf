//! Integration tests for chat relay within one server.
//!
//! Verifies that messages published to a room reach both of its members
//! (including the sender), never leak into other rooms, and keep their
//! publish order.
//!
//! Verification command: `cargo test --test chat_relay`

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use pairchat_proto::event::{self, ClientEvent, ServerEvent};
use pairchat_proto::room::{RoomId, SessionId};
use pairchat_relay::server::{ServerState, start_server_with_state};
use pairchat_relay::store::MemoryStore;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A connected client with its session id.
struct Client {
    ws: WsStream,
    id: SessionId,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let url = format!("ws://{addr}/ws");
        let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let mut client = Self {
            ws,
            id: SessionId::new(""),
        };
        match client.recv().await {
            ServerEvent::Connected(id) => client.id = id,
            other => panic!("expected connected, got {other:?}"),
        }
        client
    }

    async fn send(&mut self, event: &ClientEvent) {
        let text = event::encode_client(event).unwrap();
        self.ws
            .send(tungstenite::Message::Text(text.into()))
            .await
            .unwrap();
    }

    async fn say(&mut self, room: &RoomId, message: &str) {
        self.send(&ClientEvent::SendMessage {
            room: room.clone(),
            message: message.to_string(),
        })
        .await;
    }

    async fn recv(&mut self) -> ServerEvent {
        let msg = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
            .await
            .expect("recv timed out")
            .unwrap()
            .unwrap();
        event::decode_server(msg.to_text().unwrap()).unwrap()
    }

    async fn assert_silent(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(200), self.ws.next()).await;
        assert!(result.is_err(), "expected no event, got {result:?}");
    }
}

async fn start_relay() -> (std::net::SocketAddr, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(ServerState::new(Arc::clone(&store)));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start test server");
    (addr, store)
}

/// Pairs two fresh clients and returns them with their room.
async fn paired_clients(
    addr: std::net::SocketAddr,
    store: &MemoryStore,
) -> (Client, Client, RoomId) {
    let mut a = Client::connect(addr).await;
    let mut b = Client::connect(addr).await;

    a.send(&ClientEvent::JoinRoom).await;
    for _ in 0..200 {
        if store.snapshot("waiting_users").await == vec![a.id.to_string()] {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    b.send(&ClientEvent::JoinRoom).await;

    let room = RoomId::for_pair(&a.id, &b.id);
    assert_eq!(a.recv().await, ServerEvent::Paired(room.clone()));
    assert_eq!(b.recv().await, ServerEvent::Paired(room.clone()));
    (a, b, room)
}

#[tokio::test]
async fn message_reaches_peer_and_sender() {
    let (addr, store) = start_relay().await;
    let (mut a, mut b, room) = paired_clients(addr, &store).await;

    a.say(&room, "hi").await;

    assert_eq!(b.recv().await, ServerEvent::ChatMessage("hi".into()));
    assert_eq!(a.recv().await, ServerEvent::ChatMessage("hi".into()));
}

#[tokio::test]
async fn messages_keep_publish_order() {
    let (addr, store) = start_relay().await;
    let (mut a, mut b, room) = paired_clients(addr, &store).await;

    for i in 0..20 {
        a.say(&room, &format!("msg-{i}")).await;
    }
    for i in 0..20 {
        assert_eq!(b.recv().await, ServerEvent::ChatMessage(format!("msg-{i}")));
    }
}

#[tokio::test]
async fn both_directions_work() {
    let (addr, store) = start_relay().await;
    let (mut a, mut b, room) = paired_clients(addr, &store).await;

    b.say(&room, "hello from b").await;
    assert_eq!(a.recv().await, ServerEvent::ChatMessage("hello from b".into()));
    assert_eq!(b.recv().await, ServerEvent::ChatMessage("hello from b".into()));

    a.say(&room, "hello from a").await;
    assert_eq!(b.recv().await, ServerEvent::ChatMessage("hello from a".into()));
}

#[tokio::test]
async fn rooms_are_isolated() {
    let (addr, store) = start_relay().await;
    let (mut a, mut b, room_ab) = paired_clients(addr, &store).await;
    let (mut c, mut d, room_cd) = paired_clients(addr, &store).await;

    a.say(&room_ab, "for ab").await;
    c.say(&room_cd, "for cd").await;

    assert_eq!(b.recv().await, ServerEvent::ChatMessage("for ab".into()));
    assert_eq!(a.recv().await, ServerEvent::ChatMessage("for ab".into()));
    assert_eq!(d.recv().await, ServerEvent::ChatMessage("for cd".into()));
    assert_eq!(c.recv().await, ServerEvent::ChatMessage("for cd".into()));

    a.assert_silent().await;
    d.assert_silent().await;
}

#[tokio::test]
async fn sender_cannot_publish_into_foreign_room() {
    let (addr, store) = start_relay().await;
    let (mut a, mut b, room_ab) = paired_clients(addr, &store).await;
    let (mut c, _d, _room_cd) = paired_clients(addr, &store).await;

    c.say(&room_ab, "intrusion").await;
    b.assert_silent().await;
    a.assert_silent().await;
}

#[tokio::test]
async fn peer_disconnect_leaves_remaining_member_joined() {
    let (addr, store) = start_relay().await;
    let (mut a, mut b, room) = paired_clients(addr, &store).await;

    b.ws.close(None).await.ok();
    drop(b);
    tokio::time::sleep(Duration::from_millis(100)).await;

    a.say(&room, "anyone there?").await;
    assert_eq!(a.recv().await, ServerEvent::ChatMessage("anyone there?".into()));
}

#[tokio::test]
async fn typing_indicator_reaches_peer() {
    let (addr, store) = start_relay().await;
    let (mut a, mut b, room) = paired_clients(addr, &store).await;

    a.send(&ClientEvent::Typing { room }).await;
    assert_eq!(b.recv().await, ServerEvent::UserTyping);
    a.assert_silent().await;
}
