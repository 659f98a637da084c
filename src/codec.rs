//! Conversions between bytes, text and values.
//!
//! The persistence medium only accepts strings, so compressed bytes travel as
//! standard base64 and values travel as JSON text.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::CompressError;
use crate::value::Value;

/// Bytes encoded per base64 chunk. A multiple of 3, so chunk encodings
/// concatenate without inner padding.
pub const ENCODE_CHUNK_SIZE: usize = 3 * 8 * 1024;

/// Encode bytes as standard base64, in fixed-size chunks.
pub fn encode_bytes_to_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(ENCODE_CHUNK_SIZE) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Decode standard base64 text back into bytes.
pub fn decode_text_to_bytes(text: &str) -> Result<Vec<u8>, CompressError> {
    STANDARD
        .decode(text)
        .map_err(|e| CompressError::Codec(format!("invalid base64 payload: {}", e)))
}

/// Number of bytes `text` occupies as UTF-8.
pub fn utf8_byte_length(text: &str) -> usize {
    text.len()
}

/// Serialize a value to JSON text.
///
/// Only JSON-representable values exist in [`Value`]; a container that
/// contains itself, or nesting deeper than the reader accepts, fails with
/// [`CompressError::Serialization`].
pub fn serialize(value: &Value) -> Result<String, CompressError> {
    let json = value.to_json()?;
    serde_json::to_string(&json).map_err(|e| CompressError::Serialization(e.to_string()))
}

/// Parse JSON text back into a value.
pub fn deserialize(text: &str) -> Result<Value, CompressError> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from)
        .map_err(|e| CompressError::Deserialization(format!("malformed JSON: {}", e)))
}
