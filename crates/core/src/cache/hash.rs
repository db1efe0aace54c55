//! Cache key generation for request entries.

use sha2::{Digest, Sha256};

/// Compute the key an entry is stored under for a request.
///
/// The method is upper-cased so `get` and `GET` share an entry.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
