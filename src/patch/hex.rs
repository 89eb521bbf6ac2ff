//! Strict hexadecimal encoding for textual byte patterns.
//!
//! Decoding never pads or truncates: odd lengths, empty strings and non-hex characters are
//! rejected.

use serde::Serializer;

/// Decode an even-length hexadecimal string, case-insensitively.
///
/// # Errors
/// Returns a description of the problem if the text is empty, has an odd length, or contains
/// a character outside `[0-9a-fA-F]`.
pub fn decode(text: &str) -> std::result::Result<Vec<u8>, String> {
    if text.is_empty() {
        return Err("empty hex string".to_string());
    }

    ::hex::decode(text).map_err(|e| e.to_string())
}

/// Encode bytes as lowercase hexadecimal.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    ::hex::encode(bytes)
}

/// `serialize_with` adapter writing byte buffers as lowercase hex strings.
pub(crate) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&::hex::encode(bytes))
}
