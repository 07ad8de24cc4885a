// src/utils.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UtilsError {
    #[error("Invalid hex string: {0}")]
    InvalidHexString(String),
}

/// Convert a hex-encoded string (optionally `0x`-prefixed) to bytes.
pub fn hex_to_bytes(hex_string: &str) -> Result<Vec<u8>, UtilsError> {
    let trimmed = strip_hex_prefix(hex_string.trim());
    if trimmed.is_empty() {
        return Err(UtilsError::InvalidHexString("Hex string cannot be empty".to_string()));
    }

    hex::decode(trimmed).map_err(|e| UtilsError::InvalidHexString(e.to_string()))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}
