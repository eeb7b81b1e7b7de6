//! Standard Template Builder (C5, `spec.md` §4.5). Wraps C4, grounded on
//! the same `bond-core::blockchain::mine_next_block` shape as
//! `fork_template`, but filling the body via mempool selection instead
//! of a UTXO snapshot.

use crate::coinbase::build_standard_coinbase;
use crate::config::{MiningConfig, SIGOP_RESERVE};
use crate::error::{CoreError, CoreResult};
use crate::fork_template::random_nonce_with_reserved_bits;
use crate::header::{update_time, BlockHeader};
use crate::interfaces::{ChainView, MempoolView, UtxoView};
use crate::mempool_selector::select;
use crate::template::{merkle_root, BlockTemplate};
use crate::transaction::Input;
use chain_primitives::Hash256;

fn placeholder_coinbase() -> crate::transaction::Transaction {
    crate::transaction::Transaction::new(1, vec![Input::coinbase(vec![])], vec![], 0)
}

/// Global, process-wide telemetry updated at the end of each standard
/// build (`spec.md` §6.6 `nLastBlockTx`/`nLastBlockSize`). Returned as
/// an explicit value rather than hidden statics (`spec.md` §9 "Global
/// counters").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardBuildStats {
    pub last_block_tx: usize,
    pub last_block_size: usize,
}

/// Builds a complete standard-mode `BlockTemplate` under the combined
/// chain+pool "lock" (modeled here as the caller holding `&mut dyn
/// UtxoView` and `&dyn MempoolView` for the duration of the call —
/// `spec.md` §5 "acquired jointly with the chain mutex only during
/// standard-mode selection").
pub fn build_standard_template(
    chain: &dyn ChainView,
    mempool: &dyn MempoolView,
    utxo: &mut dyn UtxoView,
    config: &MiningConfig,
) -> CoreResult<(BlockTemplate, StandardBuildStats)> {
    let tip = chain.tip();
    let height = tip.height + 1;

    let mut template = BlockTemplate::with_placeholder_coinbase(
        BlockHeader {
            version: chain.compute_block_version(&tip),
            prev_hash: tip.hash,
            merkle_root: Hash256::zero(),
            reserved_hash: Hash256::zero(),
            time: 0,
            bits: 0,
            nonce: [0u8; 32],
            solution: Vec::new(),
        },
        placeholder_coinbase(),
    );

    let cutoff_time = tip.median_time_past.max(adjusted_now());
    let pool = mempool.entries();
    let selection = select(pool, utxo, height, cutoff_time, config);
    for (tx, (fee, sig_ops)) in selection
        .transactions
        .into_iter()
        .zip(selection.fees.into_iter().zip(selection.sig_ops))
    {
        template.push(tx, fee, sig_ops);
    }

    let subsidy = chain.block_subsidy(height);
    let total_fees = template.total_fees();
    let subsidy_plus_fees = (subsidy as i64 + total_fees).max(0) as u64;
    let coinbase = build_standard_coinbase(height, subsidy_plus_fees, config.miner_script_pubkey.clone())?;
    let coinbase_sig_ops = SIGOP_RESERVE.min(1);
    template.install_coinbase(coinbase, coinbase_sig_ops);

    template.header.merkle_root = merkle_root(&template.transactions);
    template.header.nonce = random_nonce_with_reserved_bits();
    template.header.solution = Vec::new();
    template.header.reserved_hash = Hash256::zero();
    template.header.bits = chain.next_work_required(&tip).bits();
    let next_bits = template.header.bits;
    update_time(&mut template.header, tip.median_time_past, adjusted_now(), false, || next_bits);

    chain
        .test_block_validity(&template)
        .map_err(|_| CoreError::TemplateInvalid("standard template failed validity probe".into()))?;

    let stats = StandardBuildStats {
        last_block_tx: template.transactions.len(),
        last_block_size: template.serialized_size(),
    };
    Ok((template, stats))
}

fn adjusted_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EquihashSolverKind;
    use crate::interfaces::TipInfo;
    use crate::mempool_selector::MempoolEntry;
    use crate::template::BlockTemplate as Tpl;
    use crate::transaction::{Output, Transaction};
    use chain_primitives::{Amount, BlockHeight, CompactDifficulty, OutPoint};

    struct FakeChain {
        tip: TipInfo,
        subsidy: Amount,
    }

    impl ChainView for FakeChain {
        fn tip(&self) -> TipInfo {
            self.tip
        }
        fn next_work_required(&self, _prev: &TipInfo) -> CompactDifficulty {
            CompactDifficulty::new(0x207f_ffff)
        }
        fn compute_block_version(&self, _prev: &TipInfo) -> i32 {
            4
        }
        fn block_subsidy(&self, _height: BlockHeight) -> Amount {
            self.subsidy
        }
        fn test_block_validity(&self, _template: &Tpl) -> CoreResult<()> {
            Ok(())
        }
        fn process_new_block(&self, _template: &Tpl) -> CoreResult<()> {
            Ok(())
        }
    }

    struct EmptyMempool;
    impl MempoolView for EmptyMempool {
        fn entries(&self) -> Vec<MempoolEntry> {
            Vec::new()
        }
    }

    struct EmptyUtxo;
    impl UtxoView for EmptyUtxo {
        fn get_output(&self, _outpoint: &OutPoint) -> Option<(Amount, BlockHeight)> {
            None
        }
        fn apply_transaction(&mut self, _tx: &Transaction, _height: BlockHeight) {}
    }

    /// A `UtxoView` pre-seeded with a single spendable output, used where a
    /// test needs its candidate tx's input to actually resolve.
    struct FixedUtxo {
        outpoint: OutPoint,
        entry: (Amount, BlockHeight),
    }
    impl UtxoView for FixedUtxo {
        fn get_output(&self, outpoint: &OutPoint) -> Option<(Amount, BlockHeight)> {
            (*outpoint == self.outpoint).then_some(self.entry)
        }
        fn apply_transaction(&mut self, _tx: &Transaction, _height: BlockHeight) {}
    }

    fn config() -> MiningConfig {
        MiningConfig::new_clamped(2_000_000 - 1000, 750_000, 0, vec![0xAB], EquihashSolverKind::Default)
    }

    #[test]
    fn empty_pool_produces_single_coinbase_template_paying_subsidy() {
        let chain = FakeChain {
            tip: TipInfo {
                height: 100,
                hash: Hash256::keccak256(b"tip-100"),
                median_time_past: 1_700_000_000,
            },
            subsidy: 5_000_000_000,
        };
        let mempool = EmptyMempool;
        let mut utxo = EmptyUtxo;

        let (template, stats) = build_standard_template(&chain, &mempool, &mut utxo, &config()).unwrap();

        assert_eq!(template.transactions.len(), 1);
        assert_eq!(template.fees[0], 0);
        assert_eq!(template.coinbase().outputs[0].value, 5_000_000_000);
        assert_eq!(template.header.reserved_hash, Hash256::zero());
        assert_eq!(stats.last_block_tx, 1);
    }

    #[test]
    fn coinbase_pays_subsidy_plus_accumulated_fees() {
        let chain = FakeChain {
            tip: TipInfo {
                height: 50,
                hash: Hash256::keccak256(b"tip-50"),
                median_time_past: 1_700_000_000,
            },
            subsidy: 1000,
        };
        let parent = Hash256::keccak256(b"parent");
        let pool_tx = Transaction::new(
            1,
            vec![crate::transaction::Input {
                prev_outpoint: OutPoint::new(parent, 0),
                script_sig: vec![],
            }],
            vec![Output::new(1, vec![])],
            0,
        );
        let entry = MempoolEntry {
            tx: pool_tx,
            arrival_time: 0,
            fee: 25,
            priority_delta: 0.0,
            fee_delta: 0,
            shielded_value_in: 0,
        };

        struct OneTxMempool(MempoolEntry);
        impl MempoolView for OneTxMempool {
            fn entries(&self) -> Vec<MempoolEntry> {
                vec![self.0.clone()]
            }
        }

        let mempool = OneTxMempool(entry);
        let mut utxo = FixedUtxo {
            outpoint: OutPoint::new(parent, 0),
            entry: (1000, 10),
        };
        let (template, _) = build_standard_template(&chain, &mempool, &mut utxo, &config()).unwrap();

        assert_eq!(template.transactions.len(), 2);
        assert_eq!(template.coinbase().outputs[0].value, 1025);
        assert_eq!(template.fees[0], -25);
    }
}
