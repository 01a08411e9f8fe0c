//! Checksums of uploaded solver inputs.

use sha2::{Digest, Sha256};

/// SHA-256 of `content` as lowercase hex.
pub fn calculate_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            calculate_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn different_content_different_checksum() {
        assert_ne!(calculate_checksum(b"<fet/>"), calculate_checksum(b"<fet />"));
    }
}
