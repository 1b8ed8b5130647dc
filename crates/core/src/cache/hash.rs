//! Request descriptor keys.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request descriptor.
///
/// The method is upper-cased; the URL is taken as given, so callers
/// normalize it first (fragment removed, path case preserved).
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b" ");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
