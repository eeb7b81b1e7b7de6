use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

use crate::error::ChainError;

/// 256-bit hash used for transaction ids, merkle roots and block hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// Creates a zeroed hash (used as the null outpoint txid and the
    /// genesis `prev_hash`).
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Computes the Keccak-256 digest of `data`.
    #[must_use]
    pub fn keccak256(data: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl TryFrom<&str> for Hash256 {
    type Error = ChainError;

    fn try_from(hex_str: &str) -> Result<Self, Self::Error> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| ChainError::Encoding(format!("invalid hash hex: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ChainError::Encoding("hash must be exactly 32 bytes".to_string()))?;
        Ok(Self(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_creation_and_display() {
        let hash = Hash256::zero();
        assert_eq!(hash.to_string(), "0".repeat(64));
    }

    #[test]
    fn test_keccak256_hashing() {
        let data = b"hello world";
        let hash = Hash256::keccak256(data);
        assert_ne!(hash, Hash256::zero());
        assert_eq!(hash, Hash256::keccak256(data));
    }

    #[test]
    fn try_from_rejects_wrong_length() {
        assert!(Hash256::try_from("beef").is_err());
    }

    #[test]
    fn try_from_roundtrips_through_display() {
        let hash = Hash256::keccak256(b"round trip");
        let text = hash.to_string();
        assert_eq!(Hash256::try_from(text.as_str()).unwrap(), hash);
    }
}
