//! Test doubles for the collaborator traits in `interfaces.rs` and
//! `equihash.rs`. Grounded on `panon-btc-cory::rpc::mock::MockRpc`'s
//! builder pattern (`MockRpc::builder()...build()`), adapted from an
//! async single-trait mock to this core's three synchronous traits.
//!
//! Gated so consumers embedding this core for their own tests can opt
//! in via the `testutil` feature without pulling test-only code into
//! release builds.

use crate::interfaces::{ChainView, MempoolView, TipInfo, UtxoView};
use crate::mempool_selector::MempoolEntry;
use crate::template::BlockTemplate;
use crate::transaction::Transaction;
use chain_primitives::{Amount, BlockHeight, CompactDifficulty, OutPoint};
use std::collections::HashMap;
use std::sync::Mutex;

/// A scriptable `ChainView` for tests: a fixed tip and subsidy schedule,
/// with validity/submission hooks recording what was passed to them.
pub struct MockChain {
    tip: TipInfo,
    bits: u32,
    version: i32,
    subsidy: Amount,
    reject_validity: bool,
    submitted: Mutex<Vec<BlockTemplate>>,
}

impl MockChain {
    #[must_use]
    pub fn builder() -> MockChainBuilder {
        MockChainBuilder {
            tip: TipInfo {
                height: 0,
                hash: chain_primitives::Hash256::zero(),
                median_time_past: 0,
            },
            bits: 0x207f_ffff,
            version: 4,
            subsidy: 0,
            reject_validity: false,
        }
    }

    /// Templates handed to `process_new_block` so far, in order.
    pub fn submitted_templates(&self) -> Vec<BlockTemplate> {
        self.submitted.lock().expect("mock chain mutex poisoned").clone()
    }
}

pub struct MockChainBuilder {
    tip: TipInfo,
    bits: u32,
    version: i32,
    subsidy: Amount,
    reject_validity: bool,
}

impl MockChainBuilder {
    #[must_use]
    pub fn with_tip(mut self, tip: TipInfo) -> Self {
        self.tip = tip;
        self
    }

    #[must_use]
    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    #[must_use]
    pub fn with_subsidy(mut self, subsidy: Amount) -> Self {
        self.subsidy = subsidy;
        self
    }

    #[must_use]
    pub fn rejecting_validity(mut self) -> Self {
        self.reject_validity = true;
        self
    }

    #[must_use]
    pub fn build(self) -> MockChain {
        MockChain {
            tip: self.tip,
            bits: self.bits,
            version: self.version,
            subsidy: self.subsidy,
            reject_validity: self.reject_validity,
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl ChainView for MockChain {
    fn tip(&self) -> TipInfo {
        self.tip
    }

    fn next_work_required(&self, _prev: &TipInfo) -> CompactDifficulty {
        CompactDifficulty::new(self.bits)
    }

    fn compute_block_version(&self, _prev: &TipInfo) -> i32 {
        self.version
    }

    fn block_subsidy(&self, _height: BlockHeight) -> Amount {
        self.subsidy
    }

    fn test_block_validity(&self, _template: &BlockTemplate) -> crate::error::CoreResult<()> {
        if self.reject_validity {
            Err(crate::error::CoreError::TemplateInvalid("mock rejects by request".into()))
        } else {
            Ok(())
        }
    }

    fn process_new_block(&self, template: &BlockTemplate) -> crate::error::CoreResult<()> {
        self.submitted
            .lock()
            .expect("mock chain mutex poisoned")
            .push(template.clone());
        Ok(())
    }
}

/// A fixed-contents mempool double.
pub struct MockMempool(Vec<MempoolEntry>);

impl MockMempool {
    #[must_use]
    pub fn new(entries: Vec<MempoolEntry>) -> Self {
        Self(entries)
    }
}

impl MempoolView for MockMempool {
    fn entries(&self) -> Vec<MempoolEntry> {
        self.0.clone()
    }
}

/// A plain in-memory UTXO view double, keyed by outpoint.
#[derive(Default)]
pub struct MockUtxoView(HashMap<OutPoint, (Amount, BlockHeight)>);

impl MockUtxoView {
    #[must_use]
    pub fn builder() -> MockUtxoViewBuilder {
        MockUtxoViewBuilder(HashMap::new())
    }
}

pub struct MockUtxoViewBuilder(HashMap<OutPoint, (Amount, BlockHeight)>);

impl MockUtxoViewBuilder {
    #[must_use]
    pub fn with_output(mut self, outpoint: OutPoint, value: Amount, created_at: BlockHeight) -> Self {
        self.0.insert(outpoint, (value, created_at));
        self
    }

    #[must_use]
    pub fn build(self) -> MockUtxoView {
        MockUtxoView(self.0)
    }
}

impl UtxoView for MockUtxoView {
    fn get_output(&self, outpoint: &OutPoint) -> Option<(Amount, BlockHeight)> {
        self.0.get(outpoint).copied()
    }

    fn apply_transaction(&mut self, tx: &Transaction, height: BlockHeight) {
        for (vout, output) in tx.outputs.iter().enumerate() {
            self.0.insert(OutPoint::new(tx.txid(), vout as u32), (output.value, height));
        }
    }
}

/// A solver double that immediately reports a fixed solution (or none),
/// for driving `mining_loop` tests without a real Equihash backend.
pub struct ScriptedSolver {
    pub solution: Option<Vec<u8>>,
}

impl crate::equihash::EquihashSolver for ScriptedSolver {
    fn solve(&self, _input: blake2b_simd::Hash, callbacks: &mut dyn crate::equihash::SolverCallbacks) {
        if let Some(solution) = &self.solution {
            if callbacks.cancelled() {
                return;
            }
            callbacks.valid_block(solution);
        }
    }

    fn kind(&self) -> crate::config::EquihashSolverKind {
        crate::config::EquihashSolverKind::Default
    }
}
