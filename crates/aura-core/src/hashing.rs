//! Content hashing shared by the store and the embedding cache.

use sha2::{Digest, Sha256};

/// SHA-256 of the content as a hex string
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash() {
        let hash = content_hash("moodboard");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("moodboard"));
        assert_ne!(hash, content_hash("moodboard "));
    }

    #[test]
    fn test_known_hash() {
        assert_eq!(
            content_hash("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
