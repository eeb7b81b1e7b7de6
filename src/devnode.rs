//! An in-memory stand-in for the excluded chain-state/mempool
//! collaborators (`spec.md` §1), so the `zmine` binary has something to
//! drive end to end without a real full node attached. Grounded on
//! `bond-core::blockchain::Blockchain`'s in-memory `Vec<Block>` +
//! `block_index` shape.

use chain_primitives::{block_subsidy, Amount, BlockHeight, CompactDifficulty, Hash256, OutPoint, SubsidyParams};
use mining_core::{CoreError, CoreResult, MempoolEntry, TipInfo};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One accepted block, as far as the devnode cares: just enough to
/// answer `ChainView` queries.
struct DevBlock {
    hash: Hash256,
    time: u32,
}

type UtxoMap = HashMap<OutPoint, (Amount, BlockHeight)>;

/// A single-process chain+mempool stand-in. Holds its own locks
/// internally so it can implement `ChainView`/`MempoolView` behind
/// shared references, matching `spec.md` §5's "coarse chain mutex" /
/// "pool mutex" discipline without needing a real network node.
pub struct DevNode {
    blocks: Mutex<Vec<DevBlock>>,
    mempool: Mutex<Vec<MempoolEntry>>,
    utxo: Arc<Mutex<UtxoMap>>,
    subsidy_params: SubsidyParams,
    bits: u32,
}

impl DevNode {
    #[must_use]
    pub fn new(genesis_hash: Hash256, bits: u32) -> Self {
        Self {
            blocks: Mutex::new(vec![DevBlock {
                hash: genesis_hash,
                time: adjusted_now(),
            }]),
            mempool: Mutex::new(Vec::new()),
            utxo: Arc::new(Mutex::new(HashMap::new())),
            subsidy_params: SubsidyParams::default(),
            bits,
        }
    }

    pub fn submit_mempool_entry(&self, entry: MempoolEntry) {
        self.mempool.lock().expect("mempool mutex poisoned").push(entry);
    }

    /// Hands out a `UtxoView` handle sharing this devnode's UTXO set.
    /// Each mining worker owns one of these (`spec.md` §4.7 "each
    /// owning an independent ... extra-nonce counter" — the UTXO view
    /// itself is shared, since it mirrors chain state, not per-worker
    /// state).
    #[must_use]
    pub fn utxo_view(&self) -> SharedUtxoView {
        SharedUtxoView(Arc::clone(&self.utxo))
    }
}

fn adjusted_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

impl mining_core::ChainView for DevNode {
    fn tip(&self) -> TipInfo {
        let blocks = self.blocks.lock().expect("chain mutex poisoned");
        let last = blocks.last().expect("genesis always present");
        TipInfo {
            height: (blocks.len() - 1) as BlockHeight,
            hash: last.hash,
            median_time_past: last.time,
        }
    }

    fn next_work_required(&self, _prev: &TipInfo) -> CompactDifficulty {
        CompactDifficulty::new(self.bits)
    }

    fn compute_block_version(&self, _prev: &TipInfo) -> i32 {
        4
    }

    fn block_subsidy(&self, height: BlockHeight) -> Amount {
        block_subsidy(height, &self.subsidy_params)
    }

    fn test_block_validity(&self, template: &mining_core::BlockTemplate) -> CoreResult<()> {
        if !template.satisfies_coinbase_placement() {
            return Err(CoreError::TemplateInvalid("coinbase not at index 0".into()));
        }
        if !template.satisfies_fee_accounting() {
            return Err(CoreError::TemplateInvalid("fee accounting mismatch".into()));
        }
        Ok(())
    }

    fn process_new_block(&self, template: &mining_core::BlockTemplate) -> CoreResult<()> {
        let mut blocks = self.blocks.lock().expect("chain mutex poisoned");
        blocks.push(DevBlock {
            hash: template.header.hash(),
            time: template.header.time,
        });
        Ok(())
    }
}

impl mining_core::MempoolView for DevNode {
    fn entries(&self) -> Vec<MempoolEntry> {
        self.mempool.lock().expect("mempool mutex poisoned").clone()
    }
}

/// A `Clone`-able `UtxoView` handle sharing one devnode's UTXO map.
/// `apply_transaction` takes `&mut self` per the trait contract; since
/// the shared state lives behind the inner `Arc<Mutex<_>>`, each
/// worker's owned clone satisfies that without needing exclusive
/// access to the map itself.
#[derive(Clone)]
pub struct SharedUtxoView(Arc<Mutex<UtxoMap>>);

impl mining_core::UtxoView for SharedUtxoView {
    fn get_output(&self, outpoint: &OutPoint) -> Option<(Amount, BlockHeight)> {
        self.0.lock().expect("utxo mutex poisoned").get(outpoint).copied()
    }

    fn apply_transaction(&mut self, tx: &mining_core::Transaction, height: BlockHeight) {
        let mut utxo = self.0.lock().expect("utxo mutex poisoned");
        for (vout, output) in tx.outputs.iter().enumerate() {
            utxo.insert(OutPoint::new(tx.txid(), vout as u32), (output.value, height));
        }
    }
}
