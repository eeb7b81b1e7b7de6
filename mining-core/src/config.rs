//! Configuration surface (`spec.md` §6.6). Kept free of any CLI-parsing
//! dependency so library consumers that embed the core (rather than run
//! the `zmine` binary) can construct it directly.

use chain_primitives::Hash256;

/// The two Equihash solver backends selectable via `equihashsolver`
/// (`spec.md` §6.5). Solver *internals* are out of scope for this core
/// (`spec.md` §1); this enum only records which external backend a
/// deployment wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquihashSolverKind {
    Tromp,
    Default,
}

/// Standard-mining-mode configuration (`spec.md` §6.6).
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// `blockmaxsize`, clamped to `[1000, MAX_BLOCK_SIZE - 1000]`.
    pub block_max_size: usize,
    /// `blockprioritysize`, clamped to `[0, block_max_size]`.
    pub block_priority_size: usize,
    /// `blockminsize`, clamped to `[0, block_max_size]`.
    pub block_min_size: usize,
    /// `blockversion` override, regtest only.
    pub block_version_override: Option<u32>,
    /// `mineraddress`: destination script for the standard-mode subsidy.
    pub miner_script_pubkey: Vec<u8>,
    pub equihash_solver: EquihashSolverKind,
    /// `printpriority`: logs per-tx priority and fee during selection.
    pub print_priority: bool,
    /// `-fork-mine`: permits mining during initial block download.
    pub fork_mine: bool,
    pub max_block_sigops: usize,
    /// Whether this deployment requires connected peers before mining
    /// (`spec.md` §4.6 "Peer gate": "If the node requires peers, block
    /// with 1s sleeps..."). `false` for a standalone/dev deployment with
    /// no peer-availability signal to gate on.
    pub requires_peers: bool,
}

pub const MAX_BLOCK_SIZE: usize = 2_000_000;
pub const MAX_BLOCK_SIGOPS: usize = 20_000;

/// Fixed reserves that size/sigop accounting starts at (`spec.md` I3/I4):
/// 1000 bytes to cover the header and coinbase, 100 sigops likewise.
pub const SIZE_RESERVE: usize = 1000;
pub const SIGOP_RESERVE: usize = 100;

impl MiningConfig {
    /// Builds a config, clamping `block_max_size`, `block_priority_size`
    /// and `block_min_size` per `spec.md` §6.6 and §8's boundary tests.
    #[must_use]
    pub fn new_clamped(
        block_max_size: usize,
        block_priority_size: usize,
        block_min_size: usize,
        miner_script_pubkey: Vec<u8>,
        equihash_solver: EquihashSolverKind,
    ) -> Self {
        let block_max_size = block_max_size.clamp(1000, MAX_BLOCK_SIZE - 1000);
        Self {
            block_max_size,
            block_priority_size: block_priority_size.min(block_max_size),
            block_min_size: block_min_size.min(block_max_size),
            block_version_override: None,
            miner_script_pubkey,
            equihash_solver,
            print_priority: false,
            fork_mine: false,
            max_block_sigops: MAX_BLOCK_SIGOPS,
            requires_peers: false,
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self::new_clamped(
            MAX_BLOCK_SIZE - 1000,
            750_000,
            0,
            Vec::new(),
            EquihashSolverKind::Default,
        )
    }
}

/// Fork-mining-mode configuration (`spec.md` §6.6, §4.3).
#[derive(Debug, Clone)]
pub struct ForkConfig {
    /// First height in the fork window.
    pub fork_start_height: u64,
    /// Number of heights the fork window spans.
    pub fork_height_range: u64,
    /// `forkCBPerBlock`: hard cap on synthetic coinbases per fork block.
    pub fork_cb_per_block: usize,
    /// `ZUtxoMiningStartBlock`: the single height using the shielded
    /// snapshot format.
    pub z_utxo_mining_start_block: u64,
    /// Directory holding one snapshot file per fork-window height.
    pub snapshot_dir: std::path::PathBuf,
    /// The fork sentinel placed in `reserved_hash` for fork-mode blocks.
    pub fork_sentinel: Hash256,
    /// The process-identity hash embedded in the first fork-mode
    /// coinbase's `script_sig` (`hashPid`, `spec.md` I7/GLOSSARY).
    pub hash_pid: Hash256,
}

impl ForkConfig {
    #[must_use]
    pub fn fork_window(&self) -> std::ops::Range<u64> {
        self.fork_start_height..(self.fork_start_height + self.fork_height_range)
    }

    #[must_use]
    pub fn is_fork_height(&self, height: u64) -> bool {
        self.fork_window().contains(&height)
    }

    #[must_use]
    pub fn uses_shielded_format(&self, height: u64) -> bool {
        height == self.z_utxo_mining_start_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_block_max_size_below_floor() {
        let cfg = MiningConfig::new_clamped(10, 0, 0, vec![], EquihashSolverKind::Default);
        assert_eq!(cfg.block_max_size, 1000);
    }

    #[test]
    fn clamps_block_max_size_above_ceiling() {
        let cfg = MiningConfig::new_clamped(usize::MAX, 0, 0, vec![], EquihashSolverKind::Default);
        assert_eq!(cfg.block_max_size, MAX_BLOCK_SIZE - 1000);
    }

    #[test]
    fn clamps_priority_and_min_size_to_max_size() {
        let cfg = MiningConfig::new_clamped(2000, 50_000, 50_000, vec![], EquihashSolverKind::Default);
        assert_eq!(cfg.block_priority_size, 2000);
        assert_eq!(cfg.block_min_size, 2000);
    }

    #[test]
    fn fork_window_is_half_open_and_height_gated() {
        let fork = ForkConfig {
            fork_start_height: 100,
            fork_height_range: 10,
            fork_cb_per_block: 4,
            z_utxo_mining_start_block: 105,
            snapshot_dir: "/tmp/snapshots".into(),
            fork_sentinel: Hash256::keccak256(b"sentinel"),
            hash_pid: Hash256::keccak256(b"pid"),
        };
        assert!(fork.is_fork_height(100));
        assert!(fork.is_fork_height(109));
        assert!(!fork.is_fork_height(110));
        assert!(fork.uses_shielded_format(105));
        assert!(!fork.uses_shielded_format(104));
    }
}
