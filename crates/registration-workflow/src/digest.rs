//! Content digest of an uploaded document
//!
//! The ledger anchor commits to SHA-256 over the exact bytes that were sent
//! for OCR verification. The digest travels as `0x`-prefixed lowercase hex.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestParseError {
    #[error("digest must be 64 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("digest is not valid hex: {0}")]
    InvalidHex(String),
}

impl ContentDigest {
    /// Hash a byte buffer
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        ContentDigest(digest)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        ContentDigest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse hex, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        if body.len() != 64 {
            return Err(DigestParseError::InvalidLength(body.len()));
        }
        let bytes = hex::decode(body).map_err(|e| DigestParseError::InvalidHex(e.to_string()))?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes);
        Ok(ContentDigest(digest))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentDigest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // SHA-256("abc")
        let digest = ContentDigest::of(b"abc");
        assert_eq!(
            digest.to_hex(),
            "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_deterministic_and_content_sensitive() {
        let a = ContentDigest::of(b"signature-bytes");
        let b = ContentDigest::of(b"signature-bytes");
        let c = ContentDigest::of(b"signature-byteZ");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hex_parsing() {
        let digest = ContentDigest::of(b"abc");
        assert_eq!(ContentDigest::from_hex(&digest.to_hex()).unwrap(), digest);
        assert_eq!(ContentDigest::from_hex(&digest.to_hex()[2..]).unwrap(), digest);
        assert_eq!(ContentDigest::from_hex("0xabcd"), Err(DigestParseError::InvalidLength(4)));
        assert!(matches!(
            ContentDigest::from_hex(&"zz".repeat(32)),
            Err(DigestParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_serializes_as_prefixed_hex() {
        let digest = ContentDigest::from_bytes([0xab; 32]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
