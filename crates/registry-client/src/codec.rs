//! Path-safe identifier encoding
//!
//! Service IDs and node keys are free-form strings that may contain `/`
//! or `:`. Before they are placed in a URL path they are encoded with the
//! URL-safe base64 alphabet, without padding, so the registry can recover
//! the exact bytes.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Encode raw bytes into a path segment
pub fn encode(raw: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(raw)
}

/// Decode a path segment back into raw bytes
pub fn decode(segment: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| Error::BadRequest(format!("invalid path segment {segment:?}: {e}")))
}

/// Encode an identifier string into a path segment
pub fn encode_segment(id: &str) -> String {
    encode(id.as_bytes())
}

/// Decode a path segment into an identifier string
pub fn decode_segment(segment: &str) -> Result<String> {
    let raw = decode(segment)?;
    String::from_utf8(raw)
        .map_err(|e| Error::BadRequest(format!("path segment {segment:?} is not UTF-8: {e}")))
}
