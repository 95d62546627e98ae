//! Request-derived cache key generation.

use sha2::{Digest, Sha256};

/// Compute the key of a request within one generation.
///
/// `method` is uppercased so `get` and `GET` address the same entry; `url` is
/// expected to be normalized already.
pub fn compute_cache_key(generation: &str, method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generation.as_bytes());
    hasher.update(b"\n");
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("v1", "GET", "http://localhost:5000/a.css");
        let hash2 = compute_cache_key("v1", "GET", "http://localhost:5000/a.css");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_method_case_insensitive() {
        let upper = compute_cache_key("v1", "GET", "http://localhost:5000/a.css");
        let lower = compute_cache_key("v1", "get", "http://localhost:5000/a.css");
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_cache_key("v1", "GET", "http://localhost:5000/a.css");
        let post = compute_cache_key("v1", "POST", "http://localhost:5000/a.css");
        assert_ne!(get, post);
    }

    #[test]
    fn test_hash_scoped_by_generation() {
        let v1 = compute_cache_key("v1", "GET", "http://localhost:5000/a.css");
        let v2 = compute_cache_key("v2", "GET", "http://localhost:5000/a.css");
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("v1", "GET", "http://localhost:5000/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
