//! Block subsidy halving schedule, consumed through `GetBlockSubsidy`
//! (`spec.md` §6.3). Grounded on
//! `zebra-consensus::block::subsidy::general::block_subsidy`: the
//! subsidy starts at `max_block_subsidy` and halves every
//! `halving_interval` blocks until it reaches zero.

use crate::types::{Amount, BlockHeight};

/// Parameters governing the subsidy schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsidyParams {
    pub max_block_subsidy: Amount,
    pub halving_interval: BlockHeight,
    pub max_halvings: u32,
}

impl Default for SubsidyParams {
    fn default() -> Self {
        Self {
            max_block_subsidy: 50 * 100_000_000, // 50 coins, 8 decimal places
            halving_interval: 210_000,
            max_halvings: 64,
        }
    }
}

/// Computes `GetBlockSubsidy(height)`: the miner's reward for a block at
/// `height`, before transaction fees are added.
#[must_use]
pub fn block_subsidy(height: BlockHeight, params: &SubsidyParams) -> Amount {
    let halvings = height / params.halving_interval;
    if halvings >= u64::from(params.max_halvings) {
        return 0;
    }
    params.max_block_subsidy >> halvings
}
