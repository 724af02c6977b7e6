//! Content digests recorded in the store manifest.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of a document's bytes as lowercase hex.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
