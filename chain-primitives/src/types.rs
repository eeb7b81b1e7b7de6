//! Shared scalar types used across `chain-primitives` and `mining-core`.

use serde::{Deserialize, Serialize};

/// Alias for a transaction id.
pub type TxId = crate::Hash256;

/// Alias for a block id (block header hash).
pub type BlockId = crate::Hash256;

/// Alias for a monetary amount, in the chain's smallest unit.
pub type Amount = u64;

/// Alias for a block height, counted from the genesis block at height 0.
pub type BlockHeight = u64;

/// Alias for the index of a transaction output.
pub type OutputIndex = u32;

/// Reference to a transaction output being spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub vout: OutputIndex,
}

impl OutPoint {
    #[must_use]
    pub const fn new(txid: TxId, vout: OutputIndex) -> Self {
        Self { txid, vout }
    }

    /// The designated null outpoint used by coinbase inputs (`spec.md`
    /// §3, "A *coinbase* transaction has exactly one input whose
    /// `prev_outpoint` is the designated null value").
    #[must_use]
    pub fn null() -> Self {
        Self {
            txid: crate::Hash256::zero(),
            vout: u32::MAX,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

/// Which network a node/template is operating on.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    Mainnet,
    Testnet,
    #[default]
    Regtest,
}

impl NetworkType {
    /// Regtest is the only network where blocks are mined on demand
    /// (`spec.md` §4.6 "Submit": `MineBlocksOnDemand`).
    #[must_use]
    pub fn mine_blocks_on_demand(&self) -> bool {
        matches!(self, Self::Regtest)
    }

    /// Whether `PowAllowMinDifficultyBlocks` applies (`spec.md` §6.4).
    #[must_use]
    pub fn allows_min_difficulty_blocks(&self) -> bool {
        matches!(self, Self::Regtest | Self::Testnet)
    }
}
