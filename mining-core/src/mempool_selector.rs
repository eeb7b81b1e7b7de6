//! Mempool Selector (C4, `spec.md` §4.4). New module — the teacher has
//! no fee/priority transaction selection, so this is built fresh in the
//! selection style of `bond-core::blockchain::mine_next_block` (a
//! mutable running template, checked against caps as candidates are
//! folded in) combined with the dependency-graph design `spec.md` §9
//! calls for: a pair of maps keyed by tx-id, with stable handles.

use crate::config::{MiningConfig, SIGOP_RESERVE, SIZE_RESERVE};
use crate::error::CoreError;
use crate::interfaces::UtxoView;
use crate::transaction::Transaction;
use chain_primitives::{Amount, BlockHeight, TxId};
use std::collections::{HashMap, HashSet};

/// A transaction plus its arrival time, measured fee, and admin-applied
/// deltas (`spec.md` §3 MempoolEntry).
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub arrival_time: u32,
    pub fee: i64,
    pub priority_delta: f64,
    pub fee_delta: i64,
    /// Value-in carried by this tx's shielded descriptors, folded into
    /// the priority sum unweighted by age — shielded inputs carry no
    /// per-input coin-age the way transparent UTXOs do (`spec.md` §4.4
    /// "Shielded-input value contributions are added from the
    /// transaction's shielded value-in").
    pub shielded_value_in: Amount,
}

impl MempoolEntry {
    #[must_use]
    pub fn txid(&self) -> TxId {
        self.tx.txid()
    }
}

/// A not-yet-selectable transaction plus the in-pool ids it still
/// depends on (`spec.md` §3 OrphanEntry, §9 "pair of maps keyed by
/// tx-id").
#[derive(Debug, Clone)]
struct OrphanEntry {
    entry: MempoolEntry,
    depends_on: HashSet<TxId>,
    priority: f64,
    fee_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Score {
    priority: f64,
    fee_rate: f64,
}

/// Computes `priority = Σ(input_value × input_age) / modified_tx_size +
/// priority_delta` (`spec.md` §4.4, GLOSSARY "Priority").
fn compute_priority(entry: &MempoolEntry, current_height: BlockHeight, utxo: &dyn UtxoView) -> f64 {
    let modified_size = entry.tx.serialized_size().max(1) as f64;
    let mut weighted_value = entry.shielded_value_in as f64;
    for input in &entry.tx.inputs {
        if let Some((value, created_at)) = utxo.get_output(&input.prev_outpoint) {
            let age = current_height.saturating_sub(created_at) as f64;
            weighted_value += value as f64 * age;
        }
    }
    weighted_value / modified_size + entry.priority_delta
}

/// Lock-time threshold below which `lock_time` is interpreted as a block
/// height rather than a unix timestamp (`spec.md` §4.4 `IsFinalTx`).
const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// `IsFinalTx` under a lock-time cutoff of `max(median_time_past,
/// block_time)` (`spec.md` §4.4 "Per-candidate checks"). `lock_time == 0`
/// is always final; otherwise it's measured against `current_height` or
/// `cutoff_time` depending on which domain it falls in.
fn is_final(tx: &Transaction, current_height: BlockHeight, cutoff_time: u32) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    if tx.lock_time < LOCKTIME_THRESHOLD {
        u64::from(tx.lock_time) < current_height
    } else {
        tx.lock_time < cutoff_time
    }
}

/// Whether every non-dependency input of `tx` resolves in `utxo`
/// (`spec.md` §4.4 "inputs available in the UTXO view"). Inputs spending
/// another in-pool candidate (tracked via `depends_on`) are exempt here —
/// they're re-checked once their parent is selected and applied.
fn inputs_resolvable(tx: &Transaction, depends_on: &HashSet<TxId>, utxo: &dyn UtxoView) -> bool {
    tx.inputs.iter().all(|input| {
        depends_on.contains(&input.prev_outpoint.txid) || utxo.get_output(&input.prev_outpoint).is_some()
    })
}

/// Computes `(Σ input_value − Σ output_value) / tx_size` (`spec.md`
/// §4.4 "Fee rate").
fn compute_fee_rate(entry: &MempoolEntry) -> f64 {
    let size = entry.tx.serialized_size().max(1) as f64;
    (entry.fee + entry.fee_delta) as f64 / size
}

/// Whether a low-priority/free entry is still allowed during Phase A
/// (`spec.md` §4.4 "free-allowed"): the node's free-tx policy, modeled
/// here as a fixed priority floor below which a tx needs to pay a fee
/// to be considered non-free.
const FREE_PRIORITY_THRESHOLD: f64 = 57_600_000.0;

fn is_free_allowed(score: Score) -> bool {
    score.priority >= FREE_PRIORITY_THRESHOLD || score.fee_rate > 0.0
}

/// Result of a selection pass: the chosen transactions in inclusion
/// order plus their fees and legacy-sigop counts, parallel arrays ready
/// to be folded into a `BlockTemplate` (`spec.md` §3).
pub struct SelectionResult {
    pub transactions: Vec<Transaction>,
    pub fees: Vec<i64>,
    pub sig_ops: Vec<usize>,
}

/// Runs one selection pass over `pool` against `utxo`, respecting the
/// size/sigop caps in `config` (`spec.md` §4.4). `cutoff_time` is the
/// `max(median_time_past, block_time)` lock-time cutoff candidates are
/// checked against (`IsFinalTx`).
pub fn select(
    pool: Vec<MempoolEntry>,
    utxo: &mut dyn UtxoView,
    current_height: BlockHeight,
    cutoff_time: u32,
    config: &MiningConfig,
) -> SelectionResult {
    let mut ready: Vec<(MempoolEntry, Score)> = Vec::new();
    let mut orphans: HashMap<TxId, OrphanEntry> = HashMap::new();
    // Maps a depended-on txid to the set of dependents still waiting on it.
    let mut dependents: HashMap<TxId, HashSet<TxId>> = HashMap::new();

    let in_pool_ids: HashSet<TxId> = pool.iter().map(MempoolEntry::txid).collect();

    for entry in pool {
        let depends_on: HashSet<TxId> = entry
            .tx
            .inputs
            .iter()
            .filter_map(|input| {
                let parent = input.prev_outpoint.txid;
                (parent != chain_primitives::Hash256::zero() && in_pool_ids.contains(&parent))
                    .then_some(parent)
            })
            .collect();

        if !is_final(&entry.tx, current_height, cutoff_time) || !inputs_resolvable(&entry.tx, &depends_on, utxo) {
            continue;
        }

        let priority = compute_priority(&entry, current_height, utxo);
        let fee_rate = compute_fee_rate(&entry);

        if depends_on.is_empty() {
            ready.push((entry, Score { priority, fee_rate }));
        } else {
            let txid = entry.txid();
            for parent in &depends_on {
                dependents.entry(*parent).or_default().insert(txid);
            }
            orphans.insert(
                txid,
                OrphanEntry {
                    entry,
                    depends_on,
                    priority,
                    fee_rate,
                },
            );
        }
    }

    let mut selected: Vec<Transaction> = Vec::new();
    let mut fees: Vec<i64> = Vec::new();
    let mut sig_ops: Vec<usize> = Vec::new();
    let mut running_size = SIZE_RESERVE;
    let mut running_sig_ops = SIGOP_RESERVE;

    // Phase A: priority-ordered (priority desc, fee_rate desc).
    ready.sort_by(|a, b| {
        b.1.priority
            .partial_cmp(&a.1.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.fee_rate.partial_cmp(&a.1.fee_rate).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut queue: Vec<(MempoolEntry, Score)> = ready;
    let mut phase_b = false;

    while !queue.is_empty() {
        if !phase_b {
            // Phase A active while the next entry still fits under
            // `block_priority_size` and remains free-allowed.
            let next_fits = queue.first().is_some_and(|(entry, _)| {
                running_size + entry.tx.serialized_size() < config.block_priority_size
            });
            let next_free_allowed = queue.first().is_some_and(|(_, score)| is_free_allowed(*score));
            if !next_fits || !next_free_allowed {
                phase_b = true;
                queue.sort_by(|a, b| {
                    b.1.fee_rate
                        .partial_cmp(&a.1.fee_rate)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.1.priority.partial_cmp(&a.1.priority).unwrap_or(std::cmp::Ordering::Equal))
                });
                continue;
            }
        } else if let Some((_, score)) = queue.first() {
            if running_size >= config.block_min_size && !is_free_allowed(*score) {
                queue.remove(0);
                continue;
            }
        }

        let (entry, score) = queue.remove(0);
        let size = entry.tx.serialized_size();
        let ops = entry.tx.legacy_sigops();

        if would_exceed_cap(running_size, size, config.block_max_size) {
            tracing::debug!(
                error = %CoreError::CapExceeded {
                    kind: "block_max_size",
                    cap: config.block_max_size,
                    current: running_size,
                    next: size,
                },
                "selection stopped on size cap"
            );
            break;
        }
        if would_exceed_cap(running_sig_ops, ops, config.max_block_sigops) {
            tracing::debug!(
                error = %CoreError::CapExceeded {
                    kind: "max_block_sigops",
                    cap: config.max_block_sigops,
                    current: running_sig_ops,
                    next: ops,
                },
                "candidate skipped on sigop cap"
            );
            continue;
        }
        if config.print_priority {
            tracing::debug!(
                priority = score.priority,
                fee_rate = score.fee_rate,
                txid = %entry.txid(),
                "selected transaction"
            );
        }

        running_size += size;
        running_sig_ops += ops;
        utxo.apply_transaction(&entry.tx, current_height);
        fees.push(entry.fee + entry.fee_delta);
        sig_ops.push(ops);
        let txid = entry.txid();
        selected.push(entry.tx);

        if let Some(freed) = dependents.remove(&txid) {
            for dependent_id in freed {
                if let Some(orphan) = orphans.get_mut(&dependent_id) {
                    orphan.depends_on.remove(&txid);
                    if orphan.depends_on.is_empty() {
                        let orphan = orphans.remove(&dependent_id).expect("just checked present");
                        queue.push((
                            orphan.entry,
                            Score {
                                priority: orphan.priority,
                                fee_rate: orphan.fee_rate,
                            },
                        ));
                        if !phase_b {
                            queue.sort_by(|a, b| {
                                b.1.priority
                                    .partial_cmp(&a.1.priority)
                                    .unwrap_or(std::cmp::Ordering::Equal)
                                    .then_with(|| {
                                        b.1.fee_rate.partial_cmp(&a.1.fee_rate).unwrap_or(std::cmp::Ordering::Equal)
                                    })
                            });
                        } else {
                            queue.sort_by(|a, b| {
                                b.1.fee_rate
                                    .partial_cmp(&a.1.fee_rate)
                                    .unwrap_or(std::cmp::Ordering::Equal)
                                    .then_with(|| {
                                        b.1.priority.partial_cmp(&a.1.priority).unwrap_or(std::cmp::Ordering::Equal)
                                    })
                            });
                        }
                    }
                }
            }
        }
    }

    SelectionResult {
        transactions: selected,
        fees,
        sig_ops,
    }
}

/// Whether appending `next_size` bytes to a body already at
/// `running_size` would reach `cap` (I3/I4's strict `>=` rejection,
/// `spec.md` §8 "A candidate whose inclusion would exactly equal a cap
/// is rejected").
#[must_use]
pub fn would_exceed_cap(running: usize, next: usize, cap: usize) -> bool {
    running + next >= cap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EquihashSolverKind;
    use crate::transaction::{Input, Output};
    use chain_primitives::{Hash256, OutPoint};
    use std::collections::HashMap as StdHashMap;

    struct FakeUtxo {
        outputs: StdHashMap<OutPoint, (Amount, BlockHeight)>,
    }

    impl UtxoView for FakeUtxo {
        fn get_output(&self, outpoint: &OutPoint) -> Option<(Amount, BlockHeight)> {
            self.outputs.get(outpoint).copied()
        }

        fn apply_transaction(&mut self, tx: &Transaction, height: BlockHeight) {
            for (vout, output) in tx.outputs.iter().enumerate() {
                self.outputs.insert(
                    OutPoint::new(tx.txid(), vout as u32),
                    (output.value, height),
                );
            }
        }
    }

    fn spending_tx(parent: TxId, vout: u32, fee_marker: u8) -> Transaction {
        Transaction::new(
            1,
            vec![Input {
                prev_outpoint: OutPoint::new(parent, vout),
                script_sig: vec![fee_marker],
            }],
            vec![Output::new(10, vec![])],
            0,
        )
    }

    fn entry(tx: Transaction, fee: i64) -> MempoolEntry {
        MempoolEntry {
            tx,
            arrival_time: 0,
            fee,
            priority_delta: 0.0,
            fee_delta: 0,
            shielded_value_in: 0,
        }
    }

    fn config() -> MiningConfig {
        MiningConfig::new_clamped(2_000_000 - 1000, 750_000, 0, vec![], EquihashSolverKind::Default)
    }

    #[test]
    fn selects_dependency_chain_in_order() {
        let root_txid = Hash256::keccak256(b"root");
        let tx_a = spending_tx(root_txid, 0, 1);
        let a_id = tx_a.txid();
        let tx_b = spending_tx(a_id, 0, 2);
        let b_id = tx_b.txid();
        let tx_c = spending_tx(b_id, 0, 3);

        let mut utxo = FakeUtxo {
            outputs: StdHashMap::from([(OutPoint::new(root_txid, 0), (1000, 90))]),
        };

        let pool = vec![entry(tx_c.clone(), 5), entry(tx_b.clone(), 5), entry(tx_a.clone(), 5)];
        let result = select(pool, &mut utxo, 100, 0, &config());

        assert_eq!(result.transactions.len(), 3);
        assert_eq!(result.transactions[0].txid(), a_id);
        assert_eq!(result.transactions[1].txid(), b_id);
        assert_eq!(result.transactions[2].txid(), tx_c.txid());
    }

    #[test]
    fn independent_entries_are_ordered_by_priority_then_fee_rate() {
        let root_txid = Hash256::keccak256(b"root");
        let high = spending_tx(root_txid, 0, 1);
        let low = spending_tx(root_txid, 1, 2);

        let mut utxo = FakeUtxo {
            outputs: StdHashMap::from([
                (OutPoint::new(root_txid, 0), (1_000_000, 0)),
                (OutPoint::new(root_txid, 1), (10, 99)),
            ]),
        };

        let pool = vec![entry(low.clone(), 1), entry(high.clone(), 1)];
        let result = select(pool, &mut utxo, 100, 0, &config());

        assert_eq!(result.transactions[0].txid(), high.txid());
        assert_eq!(result.transactions[1].txid(), low.txid());
    }

    #[test]
    fn cap_exceeded_helper_flags_when_next_would_reach_cap() {
        assert!(would_exceed_cap(90, 10, 100));
        assert!(!would_exceed_cap(80, 10, 100));
    }

    #[test]
    fn rejects_candidate_whose_input_is_absent_from_the_utxo_view() {
        let root_txid = Hash256::keccak256(b"root");
        let tx = spending_tx(root_txid, 0, 1);

        let mut utxo = FakeUtxo {
            outputs: StdHashMap::new(),
        };

        let pool = vec![entry(tx, 5)];
        let result = select(pool, &mut utxo, 100, 0, &config());

        assert!(result.transactions.is_empty());
    }

    #[test]
    fn rejects_candidate_not_yet_final_under_the_lock_time_cutoff() {
        let root_txid = Hash256::keccak256(b"root");
        let mut tx = spending_tx(root_txid, 0, 1);
        tx.lock_time = 500_000_100;

        let mut utxo = FakeUtxo {
            outputs: StdHashMap::from([(OutPoint::new(root_txid, 0), (1000, 90))]),
        };

        let pool = vec![entry(tx, 5)];
        let result = select(pool, &mut utxo, 100, 500_000_000, &config());

        assert!(result.transactions.is_empty());
    }

    #[test]
    fn accepts_candidate_once_final_under_the_lock_time_cutoff() {
        let root_txid = Hash256::keccak256(b"root");
        let mut tx = spending_tx(root_txid, 0, 1);
        tx.lock_time = 500_000_000;

        let mut utxo = FakeUtxo {
            outputs: StdHashMap::from([(OutPoint::new(root_txid, 0), (1000, 90))]),
        };

        let pool = vec![entry(tx, 5)];
        let result = select(pool, &mut utxo, 100, 500_000_001, &config());

        assert_eq!(result.transactions.len(), 1);
    }

    #[test]
    fn shielded_value_in_contributes_to_priority() {
        let root_txid = Hash256::keccak256(b"root");
        let tx = spending_tx(root_txid, 0, 1);

        let without = entry(tx.clone(), 5);
        let mut with_shielded = entry(tx, 5);
        with_shielded.shielded_value_in = 1_000_000_000;

        let utxo = FakeUtxo {
            outputs: StdHashMap::from([(OutPoint::new(root_txid, 0), (1000, 90))]),
        };

        let priority_without = compute_priority(&without, 100, &utxo);
        let priority_with = compute_priority(&with_shielded, 100, &utxo);

        assert!(priority_with > priority_without);
    }
}
