//! JSON payload codec for bus messages
//!
//! Every payload on the bus is a single JSON document. Inbound payloads are
//! decoded into a generic `serde_json::Value`; anything that fails here never
//! reaches a handler.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Maximum payload size (10 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Empty payload")]
    Empty,

    #[error("Invalid UTF-8 payload: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a payload into bytes ready for publishing.
///
/// Plain strings are sent as-is, everything else as JSON.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Bytes, CodecError> {
    let value = serde_json::to_value(payload)?;
    let encoded = match value {
        Value::String(s) => s.into_bytes(),
        other => serde_json::to_vec(&other)?,
    };

    if encoded.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(encoded.len()));
    }

    Ok(Bytes::from(encoded))
}

/// Decode an inbound payload into a JSON value
pub fn decode(payload: &[u8]) -> Result<Value, CodecError> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(payload.len()));
    }

    let text = std::str::from_utf8(payload)?;
    if text.trim().is_empty() {
        return Err(CodecError::Empty);
    }

    Ok(serde_json::from_str(text)?)
}
