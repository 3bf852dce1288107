// crates/cairn-core/src/crypto.rs
//
// Integrity digests for off-registry content (feedback comments, validation
// request payloads). Only the 32-byte digest is ever stored.

use sha2::{Digest, Sha256};

/// SHA-256 digest of some off-registry content.
pub type ContentHash = [u8; 32];

/// Hash arbitrary bytes with SHA-256.
pub fn digest(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Check that `data` hashes to `expected`.
pub fn matches_digest(data: &[u8], expected: &ContentHash) -> bool {
    digest(data) == *expected
}
