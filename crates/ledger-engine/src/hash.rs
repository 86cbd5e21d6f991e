//! Hashing helpers

use sha2::{Digest, Sha256};

/// Hex digest of one buffer, used to key compiled scripts
pub fn sha256_hex(data: &[u8]) -> String {
    hash_all_hex(&[data])
}

/// Hex digest of several buffers fed in order, as if concatenated
pub fn hash_all_hex(items: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item);
    }
    hex::encode(hasher.finalize())
}
