//! Envelopes published on the shared relay channel.
//!
//! Every server process subscribes to the channel and receives every
//! envelope, including the ones it published itself. Envelopes are JSON
//! objects of the form `{"event": <name>, "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::room::{RoomId, SessionId};

/// A message fanned out to every server process via the shared channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RelayEnvelope {
    /// A chat message for the members of `room`.
    Chat {
        /// Target room.
        room: RoomId,
        /// Message text, delivered verbatim as `chat-message`.
        message: String,
    },

    /// A pairing whose second member may live in another process.
    ///
    /// The process holding `session` joins it to `room` and notifies it.
    Paired {
        /// The room that was formed.
        room: RoomId,
        /// The waiting session that was matched.
        session: SessionId,
    },

    /// Typing indicator from `from` to the other members of `room`.
    Typing {
        /// Target room.
        room: RoomId,
        /// Session that is typing.
        from: SessionId,
    },
}

/// Event names this build understands.
pub const KNOWN_EVENTS: [&str; 3] = ["chat", "paired", "typing"];

/// Encodes a [`RelayEnvelope`] into bytes for publishing.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the envelope cannot be serialized.
pub fn encode(envelope: &RelayEnvelope) -> Result<Vec<u8>, CodecError> {
    codec::to_json(envelope).map(String::into_bytes)
}

/// Decodes a [`RelayEnvelope`] received from the shared channel.
///
/// Returns `Ok(None)` for a well-formed envelope whose `event` this build
/// does not recognize, so newer publishers never break older subscribers.
///
/// # Errors
///
/// Returns a [`CodecError`] if the bytes are not an envelope, or if a known
/// event carries a payload of the wrong shape.
pub fn decode(bytes: &[u8]) -> Result<Option<RelayEnvelope>, CodecError> {
    let name = codec::event_name(bytes)?;
    if !KNOWN_EVENTS.contains(&name.as_str()) {
        return Ok(None);
    }
    codec::from_json(bytes).map(Some)
}
