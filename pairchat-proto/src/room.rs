//! Session and room identifiers.
//!
//! A [`SessionId`] names one live client connection. A [`RoomId`] names the
//! pairing of exactly two sessions and is derived deterministically from
//! them, so every process computes the same id for the same pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator placed between the two session ids of a [`RoomId`].
pub const ROOM_ID_SEPARATOR: char = ':';

/// Opaque identifier of one live client connection.
///
/// Assigned by the transport at connect time and valid only for the
/// lifetime of that connection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered session identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the string form of this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a two-party room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps an existing room id string, e.g. one echoed back by a client.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the room id for a pair of sessions.
    ///
    /// The result does not depend on argument order: the two ids are joined
    /// in lexicographic order.
    #[must_use]
    pub fn for_pair(a: &SessionId, b: &SessionId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}{ROOM_ID_SEPARATOR}{hi}"))
    }

    /// Returns the string form of this room id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
