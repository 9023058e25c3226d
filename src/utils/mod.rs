//! Utility functions and helpers.

pub mod console;
pub mod http;
pub mod url;

use sha2::{Digest, Sha256};

pub use self::url::product_path;

/// Whether `value` is an absolute http(s) URL.
pub fn is_valid_url(value: &str) -> bool {
    ::url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Hex-encoded SHA-256 digest of rendered page content.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://store.example.com"));
        assert!(is_valid_url("http://localhost:8080/graphql"));
        assert!(!is_valid_url("store.example.com"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash("<html>a</html>"), content_hash("<html>a</html>"));
        assert_ne!(content_hash("<html>a</html>"), content_hash("<html>b</html>"));
    }
}
