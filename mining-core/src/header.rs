//! Block header (`spec.md` §3) and the time/difficulty finalization
//! step (`spec.md` §6.4). Grounded on `bond-core::block::BlockHeader`'s
//! constructor/hash shape, generalized to the field set `spec.md`
//! actually specifies (32-byte nonce, `reserved_hash`, `solution`).

use chain_primitives::{CompactDifficulty, Hash256};
use serde::{Deserialize, Serialize};

/// The personalization string Zcash-lineage nodes key their header
/// hash with before handing the prefix to the Equihash solver.
/// Grounded on `preston-evans98-zebra-btc`'s dependency on
/// `blake2b_simd` for exactly this purpose.
const EQUIHASH_PERSONALIZATION: &[u8; 16] = b"ZcashPoW\0\0\0\0\0\0\0\0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    /// All-zero in standard mode; the fork sentinel in fork mode
    /// (`spec.md` I6).
    pub reserved_hash: Hash256,
    pub time: u32,
    pub bits: u32,
    /// 32-byte nonce. The top 16 bits and bottom 16 bits are reserved
    /// for solver-local thread flags and counters (`spec.md` §4.3 step
    /// 4); only the middle 28 bytes are randomized freely.
    pub nonce: [u8; 32],
    /// Set by the solver on success; empty while the template is still
    /// a candidate.
    pub solution: Vec<u8>,
}

impl BlockHeader {
    #[must_use]
    pub fn bits(&self) -> CompactDifficulty {
        CompactDifficulty::new(self.bits)
    }

    /// Serializes the header prefix the solver is keyed over: everything
    /// except `nonce` and `solution` (`spec.md` §4.6 "Serialize the
    /// header without nonce and solution").
    #[must_use]
    pub fn solver_prefix(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32 * 3 + 4 + 4);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(self.merkle_root.as_bytes());
        out.extend_from_slice(self.reserved_hash.as_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out
    }

    /// Full header serialization, including `nonce` and `solution`, used
    /// to compute the block hash once a solution is in hand.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.solver_prefix();
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&(self.solution.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.solution);
        out
    }

    /// The block hash, used for the proof-of-work target comparison.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        Hash256::keccak256(&self.serialize())
    }

    /// Initializes the keyed BLAKE2b state over the nonce-less prefix
    /// (`spec.md` §4.6: "hash-init a keyed BLAKE2b state over that
    /// prefix"). The caller clones this state and extends it with the
    /// current nonce before handing it to the solver.
    #[must_use]
    pub fn equihash_base_state(&self) -> blake2b_simd::State {
        blake2b_simd::Params::new()
            .hash_length(64)
            .personal(EQUIHASH_PERSONALIZATION)
            .to_state()
            .update(&self.solver_prefix())
            .clone()
    }

    /// Clones the base state and extends it with the current nonce,
    /// producing the exact input the Equihash solver is invoked with.
    #[must_use]
    pub fn equihash_input(&self) -> blake2b_simd::Hash {
        self.equihash_base_state().update(&self.nonce).finalize()
    }
}

/// `UpdateTime` (`spec.md` §6.4): sets `header.time = max(prev.median_time_past + 1,
/// adjusted_now())`, and on networks with `PowAllowMinDifficultyBlocks`
/// also recomputes `header.bits` via `next_bits`.
pub fn update_time(
    header: &mut BlockHeader,
    prev_median_time_past: u32,
    adjusted_now: u32,
    allow_min_difficulty: bool,
    next_bits: impl FnOnce() -> u32,
) {
    header.time = (prev_median_time_past + 1).max(adjusted_now);
    if allow_min_difficulty {
        header.bits = next_bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 4,
            prev_hash: Hash256::keccak256(b"prev"),
            merkle_root: Hash256::keccak256(b"merkle"),
            reserved_hash: Hash256::zero(),
            time: 1_700_000_000,
            bits: 0x207f_ffff,
            nonce: [0u8; 32],
            solution: Vec::new(),
        }
    }

    #[test]
    fn solver_prefix_excludes_nonce_and_solution() {
        let mut a = sample_header();
        let b_prefix = a.solver_prefix();
        a.nonce[0] = 0xff;
        a.solution = vec![1, 2, 3];
        assert_eq!(a.solver_prefix(), b_prefix);
    }

    #[test]
    fn equihash_input_changes_with_nonce() {
        let mut header = sample_header();
        let first = header.equihash_input();
        header.nonce[10] = 7;
        let second = header.equihash_input();
        assert_ne!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn hash_changes_once_solution_is_set() {
        let mut header = sample_header();
        let before = header.hash();
        header.solution = vec![9, 9, 9];
        assert_ne!(header.hash(), before);
    }

    #[test]
    fn update_time_takes_the_later_of_mtp_and_now() {
        let mut header = sample_header();
        update_time(&mut header, 100, 50, false, || unreachable!());
        assert_eq!(header.time, 101);

        update_time(&mut header, 100, 500, false, || unreachable!());
        assert_eq!(header.time, 500);
    }

    #[test]
    fn update_time_recomputes_bits_when_min_difficulty_allowed() {
        let mut header = sample_header();
        update_time(&mut header, 0, 1, true, || 0x1f00_ffff);
        assert_eq!(header.bits, 0x1f00_ffff);
    }
}
