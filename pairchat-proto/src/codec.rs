//! JSON serialization shared by the client event and relay envelope codecs.
//!
//! Every PairChat wire unit is a JSON object of the form
//! `{"event": <name>, "data": <payload>}`. Client events travel as WebSocket
//! text frames; relay envelopes travel as raw bytes on the shared channel.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The input was valid JSON but not an `{"event": ...}` object.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Serializes a value into a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Deserializes a value from JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes are not valid JSON for `T`.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Reads the `event` name of a wire unit without decoding its payload.
///
/// # Errors
///
/// Returns `CodecError::Serialization` for invalid JSON and
/// `CodecError::InvalidEnvelope` if there is no string `event` field.
pub fn event_name(bytes: &[u8]) -> Result<String, CodecError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    match value.get("event") {
        Some(serde_json::Value::String(name)) => Ok(name.clone()),
        Some(other) => Err(CodecError::InvalidEnvelope(format!(
            "event must be a string, got {other}"
        ))),
        None => Err(CodecError::InvalidEnvelope("missing event field".to_string())),
    }
}
