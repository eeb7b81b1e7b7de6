//! Narrow contracts the core consumes but does not implement (`spec.md`
//! §1 "Deliberately excluded", §6.3). Grounded on
//! `panon-btc-cory::rpc::BitcoinRpc`'s trait-boundary shape, adapted
//! from async RPC calls to the synchronous, mutex-guarded collaborators
//! `spec.md` §5 describes (chain-state storage, tip tracking and the
//! mempool are in-process, not over RPC).

use crate::error::CoreResult;
use crate::mempool_selector::MempoolEntry;
use crate::template::BlockTemplate;
use crate::transaction::Transaction;
use chain_primitives::{Amount, BlockHeight, CompactDifficulty, Hash256, OutPoint};

/// A snapshot of the chain tip (`spec.md` §6.3 `tip()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipInfo {
    pub height: BlockHeight,
    pub hash: Hash256,
    pub median_time_past: u32,
}

/// The node chain interface consumed by the template builders (`spec.md`
/// §6.3). Implementations hold the single coarse chain mutex internally;
/// callers acquire/release it implicitly through these calls.
pub trait ChainView: Send + Sync {
    /// `tip() → BlockIndex`.
    fn tip(&self) -> TipInfo;

    /// `GetNextWorkRequired(prev, header) → bits`.
    fn next_work_required(&self, prev: &TipInfo) -> CompactDifficulty;

    /// `ComputeBlockVersion(prev) → int`.
    fn compute_block_version(&self, prev: &TipInfo) -> i32;

    /// `GetBlockSubsidy(height) → amount`.
    fn block_subsidy(&self, height: BlockHeight) -> Amount;

    /// Preflight validity probe; `Err(CoreError::TemplateInvalid)` on
    /// rejection (`spec.md` §6.3 `TestBlockValidity`).
    fn test_block_validity(&self, template: &BlockTemplate) -> CoreResult<()>;

    /// Submission sink (`spec.md` §6.3 `ProcessNewBlock`).
    fn process_new_block(&self, template: &BlockTemplate) -> CoreResult<()>;
}

/// The view over unspent outputs a selector/builder needs (`spec.md` §1
/// "UTXO-view semantics ... consumed through narrow contracts").
pub trait UtxoView: Send + Sync {
    /// The output being spent, and the height it was created at (for
    /// `input_age` in the priority formula, `spec.md` §4.4).
    fn get_output(&self, outpoint: &OutPoint) -> Option<(Amount, BlockHeight)>;

    /// `UpdateCoins` (`spec.md` §4.4): mutates the view so later
    /// candidates in the same selection pass see this tx's effect.
    fn apply_transaction(&mut self, tx: &Transaction, height: BlockHeight);
}

/// The pending-transaction pool (`spec.md` §1 "the pending-transaction
/// pool itself" is excluded; only iteration over its current contents is
/// needed here).
pub trait MempoolView: Send + Sync {
    fn entries(&self) -> Vec<MempoolEntry>;
}
