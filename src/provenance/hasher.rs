//! SW-014: BLAKE3 fingerprints for rendered templates and resource entries.

use serde::Serialize;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Hash the compact JSON form of a value. Key order is preserved, so equal
/// values built the same way hash equally.
pub fn hash_json<T: Serialize>(value: &T) -> Result<String, String> {
    let json = serde_json::to_vec(value).map_err(|e| format!("JSON serialize error: {}", e))?;
    Ok(format!("blake3:{}", blake3::hash(&json).to_hex()))
}
