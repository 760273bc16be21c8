//! Digest helpers used to derive stable identifiers

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a string
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
