//! Compact ("bits") difficulty encoding and the 256-bit target it
//! expands to (`spec.md` §6.4's `compact_to_256`, referenced but not
//! defined in the distilled spec — this is the standard Bitcoin/Zcash
//! nBits codec: a one-byte exponent plus a three-byte mantissa).

use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::hash::Hash256;

/// Compact difficulty representation, as stored in `BlockHeader::bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactDifficulty(pub u32);

/// A fully expanded 256-bit target, big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target([u8; 32]);

impl CompactDifficulty {
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Expands compact bits into a 256-bit big-endian target.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidDifficultyBits`] if the encoded
    /// mantissa would overflow the 32-byte target.
    pub fn to_target(&self) -> Result<Target, ChainError> {
        let bits = self.0;
        let exponent = (bits >> 24) as usize;
        let mantissa = bits & 0x007f_ffff;
        let negative = bits & 0x0080_0000 != 0;

        if negative || exponent > 34 {
            return Err(ChainError::InvalidDifficultyBits(bits));
        }

        let mut out = [0u8; 32];
        if exponent <= 3 {
            let shifted = mantissa >> (8 * (3 - exponent));
            out[29..32].copy_from_slice(&shifted.to_be_bytes()[1..]);
        } else {
            let offset = exponent - 3;
            if offset > 29 {
                return Err(ChainError::InvalidDifficultyBits(bits));
            }
            let mantissa_bytes = mantissa.to_be_bytes();
            let start = 32 - offset - 3;
            out[start..start + 3].copy_from_slice(&mantissa_bytes[1..]);
        }
        Ok(Target(out))
    }
}

impl Target {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True if `hash`, read as a big-endian 256-bit integer, is `<=` this
    /// target — the standard proof-of-work check
    /// (`spec.md` §4.6 "compare with `hash_target`").
    #[must_use]
    pub fn meets(&self, hash: &Hash256) -> bool {
        hash.as_bytes().as_slice() <= self.0.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_small_mantissa() {
        // 0x01003456 -> exponent 1, mantissa 0x003456 -> a single byte 0x00
        let compact = CompactDifficulty::new(0x0100_3456);
        let target = compact.to_target().unwrap();
        assert_eq!(target.as_bytes()[31], 0x00);
    }

    #[test]
    fn expands_large_mantissa() {
        // A realistic low-difficulty regtest-style target.
        let compact = CompactDifficulty::new(0x207f_ffff);
        let target = compact.to_target().unwrap();
        assert_ne!(*target.as_bytes(), [0u8; 32]);
    }

    #[test]
    fn rejects_negative_and_oversized() {
        assert!(CompactDifficulty::new(0x0080_0000).to_target().is_err());
        assert!(CompactDifficulty::new(0xff12_3456).to_target().is_err());
    }

    #[test]
    fn hash_at_or_below_target_meets_it() {
        let compact = CompactDifficulty::new(0x207f_ffff);
        let target = compact.to_target().unwrap();
        let low_hash = Hash256::zero();
        assert!(target.meets(&low_hash));
    }
}
