//! Server core: shared state, WebSocket session actor, and HTTP routes.
//!
//! Each accepted WebSocket becomes one session. The session actor owns the
//! session's [`SessionPhase`], handles its client events one at a time, and
//! forwards events delivered through the [`GroupRegistry`] to the socket.
//! On disconnect the session is removed from the waiting queue and from its
//! delivery groups.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use pairchat_proto::event::{self, ClientEvent, ServerEvent};
use pairchat_proto::room::{RoomId, SessionId};
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::groups::GroupRegistry;
use crate::matchmaker::Matchmaker;
use crate::relay::Relay;
use crate::session::SessionPhase;
use crate::store::{MemoryStore, SharedStore};

/// Body of the health-check route.
pub const HEALTH_BODY: &str = "Backend is running!";

/// Shared per-process server state.
pub struct ServerState<S> {
    /// Connected sessions and room delivery groups of this process.
    pub groups: Arc<GroupRegistry>,
    /// Pairs sessions through the shared waiting queue.
    pub matchmaker: Matchmaker<S>,
    /// Publishes to and consumes from the shared relay channel.
    pub relay: Relay<S>,
    /// Maximum accepted chat message length in bytes.
    max_message_size: usize,
}

impl ServerState<MemoryStore> {
    /// Creates a state backed by a private in-memory store with default
    /// settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_config(Arc::new(MemoryStore::new()), &RelayConfig::default())
    }
}

impl<S: SharedStore> ServerState<S> {
    /// Creates a state over `store` using the default queue key, channel, and
    /// message size limit.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, &RelayConfig::default())
    }

    /// Creates a state over `store` using the names and limits in `config`.
    ///
    /// Several states sharing one store behave like several server
    /// processes sharing one external store.
    pub fn with_config(store: Arc<S>, config: &RelayConfig) -> Self {
        let groups = Arc::new(GroupRegistry::new());
        let relay = Relay::new(Arc::clone(&store), Arc::clone(&groups), &config.channel);
        let matchmaker = Matchmaker::new(
            store,
            Arc::clone(&groups),
            relay.clone(),
            &config.queue_key,
        );
        Self {
            groups,
            matchmaker,
            relay,
            max_message_size: config.max_message_size,
        }
    }

    /// Returns the maximum accepted chat message length in bytes.
    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

/// Runs one WebSocket connection as a session actor.
///
/// The connection lifecycle:
/// 1. Assign a session id, register it, and send `connected`.
/// 2. Loop: handle client events one at a time and forward delivered events.
/// 3. On disconnect, remove the session from the waiting queue and from its
///    delivery groups.
pub async fn handle_socket<S: SharedStore>(socket: WebSocket, state: Arc<ServerState<S>>) {
    let session = SessionId::generate();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.groups.connect(&session, tx).await;
    tracing::info!(session = %session, "session connected");

    if let Err(e) = send_event(&mut ws_sender, &ServerEvent::Connected(session.clone())).await {
        tracing::warn!(session = %session, error = %e, "failed to send connected event");
        disconnect(&session, None, &state).await;
        return;
    }

    let mut phase = SessionPhase::Idle;
    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_client_text(&session, &mut phase, text.as_str(), &state).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Ignore binary, ping, pong frames.
                }
                Some(Err(e)) => {
                    tracing::warn!(session = %session, error = %e, "WebSocket read failed");
                    break;
                }
            },
            outbound = rx.recv() => {
                let Some(event) = outbound else { break };
                phase.observe(&event);
                if let Err(e) = send_event(&mut ws_sender, &event).await {
                    tracing::warn!(
                        session = %session,
                        event = event.name(),
                        error = %e,
                        "WebSocket write failed"
                    );
                    break;
                }
            }
        }
    }

    disconnect(&session, phase.room(), &state).await;
}

/// Removes a session from the waiting queue and its delivery groups.
async fn disconnect<S: SharedStore>(
    session: &SessionId,
    room: Option<&RoomId>,
    state: &ServerState<S>,
) {
    if let Err(e) = state.matchmaker.cleanup(session).await {
        tracing::warn!(
            session = %session,
            error = %e,
            "waiting queue cleanup abandoned, entry may be stale"
        );
    }
    let rooms = state.groups.disconnect(session).await;
    tracing::info!(
        session = %session,
        room = room.map_or("none", RoomId::as_str),
        groups_left = rooms.len(),
        "session disconnected"
    );
}

/// Decodes and handles one text frame from a session.
async fn handle_client_text<S: SharedStore>(
    session: &SessionId,
    phase: &mut SessionPhase,
    text: &str,
    state: &ServerState<S>,
) {
    let event = match event::decode_client(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(session = %session, error = %e, "failed to decode client event");
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom => handle_join_room(session, phase, state).await,
        ClientEvent::SendMessage { room, message } => {
            handle_send_message(session, &room, &message, state).await;
        }
        ClientEvent::Typing { room } => {
            if !state.groups.is_member(&room, session).await {
                return;
            }
            if let Err(e) = state.relay.publish_typing(&room, session).await {
                tracing::debug!(session = %session, error = %e, "typing indicator dropped");
            }
        }
    }
}

async fn handle_join_room<S: SharedStore>(
    session: &SessionId,
    phase: &mut SessionPhase,
    state: &ServerState<S>,
) {
    if !phase.accepts_join() {
        tracing::debug!(session = %session, phase = ?phase, "ignoring redundant join-room");
        return;
    }

    match state.matchmaker.request_pairing(session).await {
        Ok(outcome) => phase.apply(&outcome),
        Err(e) => {
            tracing::warn!(
                session = %session,
                error = %e,
                "pairing request dropped, session left un-queued"
            );
        }
    }
}

async fn handle_send_message<S: SharedStore>(
    session: &SessionId,
    room: &RoomId,
    message: &str,
    state: &ServerState<S>,
) {
    if !state.groups.is_member(room, session).await {
        tracing::warn!(
            session = %session,
            room = %room,
            "send-message to a room the session has not joined"
        );
        return;
    }

    if message.len() > state.max_message_size {
        tracing::warn!(
            session = %session,
            size = message.len(),
            max = state.max_message_size,
            "message exceeds size limit"
        );
        return;
    }

    tracing::debug!(
        session = %session,
        room = %room,
        len = message.len(),
        "publishing chat message"
    );
    if let Err(e) = state.relay.publish(room, message).await {
        tracing::warn!(session = %session, room = %room, error = %e, "chat message dropped");
    }
}

/// Encodes and sends a server event directly on a WebSocket sender.
async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &ServerEvent,
) -> Result<(), String> {
    let text = event::encode_server(event).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts a server with a private in-memory store on the given address and
/// returns the bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the relay subscription cannot be established or the
/// TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::in_memory())).await
}

/// Starts a server with a pre-configured [`ServerState`].
///
/// Subscribes the relay to the shared channel before accepting connections,
/// so no envelope published after start-up is missed.
///
/// # Errors
///
/// Returns an error if the relay subscription cannot be established or the
/// TCP listener cannot bind to the given address.
pub async fn start_server_with_state<S: SharedStore>(
    addr: &str,
    state: Arc<ServerState<S>>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let relay_task = state.relay.spawn().await?;

    let app = axum::Router::new()
        .route("/", axum::routing::get(health))
        .route("/ws", axum::routing::get(ws_handler::<S>))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
        relay_task.abort();
    });

    Ok((bound_addr, handle))
}

/// Health-check handler.
async fn health() -> &'static str {
    HEALTH_BODY
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler<S: SharedStore>(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<ServerState<S>>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
