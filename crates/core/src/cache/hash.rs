//! Request key hashing.

use crate::http::RequestKey;
use sha2::{Digest, Sha256};

/// Compute the stored key hash for a request key.
pub fn compute_key_hash(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(key.url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use url::Url;

    fn key(method: Method, url: &str) -> RequestKey {
        RequestKey::new(method, &Url::parse(url).unwrap())
    }

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_key_hash(&key(Method::Get, "https://example.com/a.mp3"));
        let hash2 = compute_key_hash(&key(Method::Get, "https://example.com/a.mp3"));
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_key_hash(&key(Method::Get, "https://example.com/"));
        let head = compute_key_hash(&key(Method::Head, "https://example.com/"));
        assert_ne!(get, head);
    }

    #[test]
    fn test_hash_ignores_fragment() {
        let a = compute_key_hash(&key(Method::Get, "https://example.com/index.html#player"));
        let b = compute_key_hash(&key(Method::Get, "https://example.com/index.html"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_key_hash(&key(Method::Get, "https://example.com"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
