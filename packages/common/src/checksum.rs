use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::service::ServiceError;

/// A validated SHA-256 checksum of a blob's bytes.
///
/// Recorded at write time and immutable afterwards; recomputing the checksum
/// from stored bytes must always yield this value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Compute the SHA-256 checksum of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Construct from raw SHA-256 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded checksum string.
    pub fn from_hex(s: &str) -> Result<Self, ServiceError> {
        if s.len() != 64 {
            return Err(ServiceError::InvalidChecksum(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }

        let bytes = hex::decode(s)
            .map_err(|e| ServiceError::InvalidChecksum(format!("invalid hex: {e}")))?;

        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ServiceError::InvalidChecksum("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// Check that `data` hashes to this checksum.
    ///
    /// The write-integrity gate: every adapter calls this before committing
    /// bytes, so a stored object can never disagree with the checksum
    /// recorded for it.
    pub fn verify(&self, data: &[u8]) -> Result<(), ServiceError> {
        let actual = Self::compute(data);
        if actual != *self {
            return Err(ServiceError::ChecksumMismatch {
                expected: self.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }

    /// Return the checksum as a 64-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Return the raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Checksum {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        let data = b"hello world";
        let c1 = Checksum::compute(data);
        let c2 = Checksum::compute(data);
        assert_eq!(c1, c2);
    }

    #[test]
    fn compute_differs_for_different_data() {
        let c1 = Checksum::compute(b"hello");
        let c2 = Checksum::compute(b"world");
        assert_ne!(c1, c2);
    }

    #[test]
    fn hex_round_trip() {
        let original = Checksum::compute(b"test data");
        let hex_str = original.to_hex();
        let parsed = Checksum::from_hex(&hex_str).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        let bad = "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz";
        assert!(Checksum::from_hex(bad).is_err());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(Checksum::from_hex("abcd").is_err());
    }

    #[test]
    fn verify_accepts_matching_bytes() {
        let checksum = Checksum::compute(b"payload");
        assert!(checksum.verify(b"payload").is_ok());
    }

    #[test]
    fn verify_rejects_other_bytes() {
        let checksum = Checksum::compute(b"payload");
        let err = checksum.verify(b"tampered").unwrap_err();
        assert!(matches!(err, ServiceError::ChecksumMismatch { .. }));
    }

    #[test]
    fn display_matches_to_hex() {
        let checksum = Checksum::compute(b"display test");
        assert_eq!(format!("{checksum}"), checksum.to_hex());
    }

    #[test]
    fn serde_round_trip() {
        let checksum = Checksum::compute(b"serde test");
        let json = serde_json::to_string(&checksum).unwrap();
        let parsed: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(checksum, parsed);
    }
}
