//! Client-facing event contract.
//!
//! Each event is one WebSocket text frame holding
//! `{"event": <name>, "data": <payload>}`; `data` is absent for events that
//! carry no payload. Event names are the public wire surface and must not
//! change.

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::room::{RoomId, SessionId};

/// Events sent by a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Ask to be paired with another anonymous client.
    JoinRoom,
    /// Send a chat message to the room the client was paired into.
    SendMessage {
        /// Room id previously received in a `paired` event.
        room: RoomId,
        /// Message text.
        message: String,
    },
    /// Best-effort "I am typing" signal for the peer.
    Typing {
        /// Room the client is typing in.
        room: RoomId,
    },
}

/// Events sent by the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First event on every connection: the session id the transport assigned.
    Connected(SessionId),
    /// The client has been paired; carries the new room id.
    Paired(RoomId),
    /// A chat message relayed from the room.
    ChatMessage(String),
    /// The peer is typing.
    UserTyping,
}

impl ServerEvent {
    /// Returns the wire name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Paired(_) => "paired",
            Self::ChatMessage(_) => "chat-message",
            Self::UserTyping => "user-typing",
        }
    }
}

/// Encodes a [`ClientEvent`] into a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode_client(event: &ClientEvent) -> Result<String, CodecError> {
    codec::to_json(event)
}

/// Decodes a [`ClientEvent`] from a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` for invalid JSON, unknown event names,
/// or payloads of the wrong shape.
pub fn decode_client(text: &str) -> Result<ClientEvent, CodecError> {
    codec::from_json(text.as_bytes())
}

/// Encodes a [`ServerEvent`] into a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode_server(event: &ServerEvent) -> Result<String, CodecError> {
    codec::to_json(event)
}

/// Decodes a [`ServerEvent`] from a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` for invalid JSON or unknown events.
pub fn decode_server(text: &str) -> Result<ServerEvent, CodecError> {
    codec::from_json(text.as_bytes())
}
