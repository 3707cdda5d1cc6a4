//! Content hashes carried as package metadata.
//!
//! The registry stores the hash but never interprets it; checking a hash
//! against an artifact is the job of [`crate::verify`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

/// A content hash (SHA-256 lowercase hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }

    /// Parse a hex digest, normalising it to lowercase.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RegistryError::InvalidRecord {
                detail: format!("content hash '{s}' is not a 64-character SHA-256 hex digest"),
            });
        }
        Ok(ContentHash(s.to_ascii_lowercase()))
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the given data hashes to this value.
    pub fn matches(&self, data: &[u8]) -> bool {
        ContentHash::compute(data) == *self
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self> {
        ContentHash::parse(&s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digest() {
        assert_eq!(
            ContentHash::compute(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn matches_detects_tampering() {
        let hash = ContentHash::compute(b"schema v1");
        assert!(hash.matches(b"schema v1"));
        assert!(!hash.matches(b"schema v2"));
    }

    #[test]
    fn parse_normalises_case() {
        let upper = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";
        let hash = ContentHash::parse(upper).unwrap();
        assert_eq!(hash, ContentHash::compute(b""));
    }

    #[test]
    fn parse_rejects_bad_digests() {
        assert!(ContentHash::parse("abc").is_err());
        assert!(ContentHash::parse(&"g".repeat(64)).is_err());
    }

    #[test]
    fn serde_as_plain_string() {
        let hash = ContentHash::compute(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
        assert!(serde_json::from_str::<ContentHash>("\"nothex\"").is_err());
    }
}
