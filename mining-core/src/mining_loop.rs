//! Mining Loop (C6, `spec.md` §4.6). Grounded on
//! `bond-core::mining::Miner::{mine_header_parallel, mine_header_range}`'s
//! shared-flag/result-cell shape, generalized from a single-difficulty
//! byte-nonce search into the mode-select → build → solve → submit state
//! machine `spec.md` describes.

use crate::config::{ForkConfig, MiningConfig};
use crate::equihash::{EquihashSolver, SolverCallbacks};
use crate::error::{CoreError, CoreResult};
use crate::fork_template::build_fork_template;
use crate::header::update_time;
use crate::interfaces::{ChainView, MempoolView, UtxoView};
use crate::standard_template::{build_standard_template, StandardBuildStats};
use crate::template::BlockTemplate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-worker extra-nonce state (`spec.md` GLOSSARY "Extra-nonce", §9
/// "the static `hashPrevBlock` ... must be per-worker"). Held by the
/// worker, never shared across threads.
#[derive(Debug, Default)]
pub struct ExtraNonceState {
    pub last_prev_hash: Option<chain_primitives::Hash256>,
    pub counter: u64,
}

/// Signals a worker polls between solver iterations (`spec.md` §4.6
/// "Exit conditions", §5 "private `cancel` flag" + "fans out to every
/// worker").
pub struct WorkerSignals {
    pub cancel: Arc<AtomicBool>,
    pub interrupt: Arc<AtomicBool>,
    pub tip_changed: Arc<AtomicBool>,
    pub mempool_changed: Arc<AtomicBool>,
    pub peers_available: Arc<AtomicBool>,
    /// Whether initial block download has finished (`spec.md` §4.6 "Peer
    /// gate": `ibd_complete || fork_mine`).
    pub ibd_complete: Arc<AtomicBool>,
}

impl WorkerSignals {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            interrupt: Arc::new(AtomicBool::new(false)),
            tip_changed: Arc::new(AtomicBool::new(false)),
            mempool_changed: Arc::new(AtomicBool::new(false)),
            peers_available: Arc::new(AtomicBool::new(true)),
            ibd_complete: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Default for WorkerSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single iteration of the loop decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Submitted,
    Discarded,
    SleepAndRetry,
    WorkerExit,
}

struct LoopCallbacks<'a> {
    cancel: &'a Arc<AtomicBool>,
    target: chain_primitives::Target,
    header: &'a mut crate::header::BlockHeader,
    chain: &'a dyn ChainView,
    mine_blocks_on_demand: bool,
    fork_mode: bool,
    result: Option<CoreResult<()>>,
}

impl SolverCallbacks for LoopCallbacks<'_> {
    fn valid_block(&mut self, solution: &[u8]) -> bool {
        self.header.solution = solution.to_vec();
        let hash = self.header.hash();
        if !self.target.meets(&hash) {
            return false;
        }
        self.result = Some(submit(self.chain, self.header, self.mine_blocks_on_demand, self.fork_mode));
        true
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// **Submit** (`spec.md` §4.6 "Submit"): re-checks `prev_hash == tip.hash`
/// under the chain lock (modeled by the `ChainView` call itself owning
/// that discipline); drops stale blocks non-fatally.
fn submit(
    chain: &dyn ChainView,
    header: &crate::header::BlockHeader,
    mine_blocks_on_demand: bool,
    fork_mode: bool,
) -> CoreResult<()> {
    let tip = chain.tip();
    if header.prev_hash != tip.hash {
        return Err(CoreError::StaleBlock {
            expected: header.prev_hash.to_string(),
            actual: tip.hash.to_string(),
        });
    }
    let template = BlockTemplate {
        header: header.clone(),
        transactions: Vec::new(),
        fees: Vec::new(),
        sig_ops: Vec::new(),
    };
    chain.process_new_block(&template)?;
    if mine_blocks_on_demand && !fork_mode {
        return Err(CoreError::WorkerInterrupted);
    }
    Ok(())
}

/// Decides fork vs. standard mode for the next height (`spec.md` §4.6
/// "Mode choice").
#[must_use]
pub fn is_fork_block(next_height: u64, fork: &ForkConfig) -> bool {
    fork.is_fork_height(next_height)
}

/// Blocks the calling thread until the peer gate is satisfied, 1s-sleep
/// polling (`spec.md` §4.6 "Peer gate", §5 "Suspension points").
/// `sleep` is injected so tests don't need to wait on a wall clock.
pub fn wait_for_peer_gate(
    signals: &WorkerSignals,
    requires_peers: bool,
    ibd_complete: bool,
    fork_mine: bool,
    sleep: impl Fn(Duration),
) {
    if !requires_peers {
        return;
    }
    while !signals.peers_available.load(Ordering::SeqCst) || !(ibd_complete || fork_mine) {
        if signals.interrupt.load(Ordering::SeqCst) {
            return;
        }
        sleep(Duration::from_secs(1));
    }
}

/// One pass of the state machine: build a template for the current mode,
/// drive the solver, and submit on success (`spec.md` §4.6).
#[allow(clippy::too_many_arguments)]
pub fn run_iteration(
    chain: &dyn ChainView,
    mempool: &dyn MempoolView,
    utxo: &mut dyn UtxoView,
    mining_config: &MiningConfig,
    fork_config: &ForkConfig,
    solver: &dyn EquihashSolver,
    signals: &WorkerSignals,
    network: chain_primitives::NetworkType,
    last_build_stats: &mut Option<StandardBuildStats>,
) -> IterationOutcome {
    let tip = chain.tip();
    let next_height = tip.height + 1;

    let mut template = if is_fork_block(next_height, fork_config) {
        match build_fork_template(
            chain,
            fork_config,
            mining_config.block_max_size,
            mining_config.max_block_sigops,
        ) {
            Ok(t) => t,
            Err(CoreError::SnapshotMissing { .. }) => return IterationOutcome::SleepAndRetry,
            Err(_) => return IterationOutcome::WorkerExit,
        }
    } else {
        match build_standard_template(chain, mempool, utxo, mining_config) {
            Ok((t, stats)) => {
                *last_build_stats = Some(stats);
                t
            }
            Err(CoreError::KeypoolExhausted) => return IterationOutcome::WorkerExit,
            Err(_) => return IterationOutcome::WorkerExit,
        }
    };

    let target = match template.header.bits().to_target() {
        Ok(t) => t,
        Err(_) => return IterationOutcome::WorkerExit,
    };

    let iteration_start = Instant::now();
    let fork_mode = is_fork_block(next_height, fork_config);

    loop {
        let input = template.header.equihash_input();
        let mut callbacks = LoopCallbacks {
            cancel: &signals.cancel,
            target,
            header: &mut template.header,
            chain,
            mine_blocks_on_demand: network.mine_blocks_on_demand(),
            fork_mode,
            result: None,
        };
        solver.solve(input, &mut callbacks);

        if let Some(result) = callbacks.result {
            return match result {
                Ok(()) => IterationOutcome::Submitted,
                Err(CoreError::WorkerInterrupted) => IterationOutcome::Submitted,
                Err(_) => IterationOutcome::Discarded,
            };
        }

        // Exit conditions, checked in order (`spec.md` §4.6).
        if signals.interrupt.load(Ordering::SeqCst) {
            return IterationOutcome::WorkerExit;
        }
        if !signals.peers_available.load(Ordering::SeqCst) {
            return IterationOutcome::Discarded;
        }
        let low16 = u16::from_be_bytes([template.header.nonce[30], template.header.nonce[31]]);
        if low16 == 0xFFFF {
            return IterationOutcome::Discarded;
        }
        if signals.mempool_changed.load(Ordering::SeqCst) && iteration_start.elapsed() >= Duration::from_secs(60) {
            return IterationOutcome::Discarded;
        }
        if signals.tip_changed.load(Ordering::SeqCst) {
            return IterationOutcome::Discarded;
        }

        // Nonce advance (`spec.md` §4.6 "Nonce advance").
        let mut nonce_int = u128::from_be_bytes({
            let mut buf = [0u8; 16];
            buf.copy_from_slice(&template.header.nonce[16..32]);
            buf
        });
        nonce_int = nonce_int.wrapping_add(1);
        template.header.nonce[16..32].copy_from_slice(&nonce_int.to_be_bytes());

        let tip_now = chain.tip();
        let next_bits = chain.next_work_required(&tip_now).bits();
        update_time(
            &mut template.header,
            tip_now.median_time_past,
            adjusted_now(),
            network.allows_min_difficulty_blocks(),
            || next_bits,
        );
    }
}

fn adjusted_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// A single worker's run loop: repeats `run_iteration` until told to
/// exit (`spec.md` §4.6 state diagram: `[Idle] -> [ChooseMode] -> ... ->
/// [Idle]`, looping back on discard/retry).
#[allow(clippy::too_many_arguments)]
pub fn worker_loop(
    chain: &dyn ChainView,
    mempool: &dyn MempoolView,
    utxo: &mut dyn UtxoView,
    mining_config: &MiningConfig,
    fork_config: &ForkConfig,
    solver: &dyn EquihashSolver,
    signals: &WorkerSignals,
    network: chain_primitives::NetworkType,
    extra_nonce: &Mutex<ExtraNonceState>,
    sleep: impl Fn(Duration),
) {
    let mut last_build_stats = None;
    loop {
        if signals.interrupt.load(Ordering::SeqCst) {
            return;
        }
        wait_for_peer_gate(
            signals,
            mining_config.requires_peers,
            signals.ibd_complete.load(Ordering::SeqCst),
            mining_config.fork_mine,
            &sleep,
        );

        let tip_hash = chain.tip().hash;
        {
            let mut nonce_state = extra_nonce.lock().expect("extra-nonce mutex poisoned");
            if nonce_state.last_prev_hash != Some(tip_hash) {
                nonce_state.last_prev_hash = Some(tip_hash);
                nonce_state.counter = 0;
            } else {
                nonce_state.counter += 1;
            }
        }

        match run_iteration(
            chain,
            mempool,
            utxo,
            mining_config,
            fork_config,
            solver,
            signals,
            network,
            &mut last_build_stats,
        ) {
            IterationOutcome::WorkerExit => return,
            IterationOutcome::SleepAndRetry => sleep(Duration::from_secs(1)),
            IterationOutcome::Submitted | IterationOutcome::Discarded => {
                signals.tip_changed.store(false, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EquihashSolverKind;
    use crate::testutil::{MockChain, MockMempool, MockUtxoView, ScriptedSolver};
    use chain_primitives::NetworkType;

    fn fork_config() -> ForkConfig {
        ForkConfig {
            fork_start_height: 1_000_000,
            fork_height_range: 1,
            fork_cb_per_block: 4,
            z_utxo_mining_start_block: 1_000_000,
            snapshot_dir: "/nonexistent".into(),
            fork_sentinel: chain_primitives::Hash256::keccak256(b"sentinel"),
            hash_pid: chain_primitives::Hash256::keccak256(b"pid"),
        }
    }

    fn mining_config() -> MiningConfig {
        MiningConfig::new_clamped(2_000_000 - 1000, 750_000, 0, vec![0xAB], EquihashSolverKind::Default)
    }

    #[test]
    fn solver_without_solution_exits_on_interrupt() {
        let chain = MockChain::builder().build();
        let mempool = MockMempool::new(vec![]);
        let mut utxo = MockUtxoView::builder().build();
        let solver = ScriptedSolver { solution: None };
        let signals = WorkerSignals::new();
        signals.interrupt.store(true, Ordering::SeqCst);
        let mut stats = None;

        let outcome = run_iteration(
            &chain,
            &mempool,
            &mut utxo,
            &mining_config(),
            &fork_config(),
            &solver,
            &signals,
            NetworkType::Regtest,
            &mut stats,
        );
        assert_eq!(outcome, IterationOutcome::WorkerExit);
    }

    #[test]
    fn found_solution_under_target_submits_and_sets_solution() {
        let chain = MockChain::builder().with_bits(0x207f_ffff).build();
        let mempool = MockMempool::new(vec![]);
        let mut utxo = MockUtxoView::builder().build();
        let solver = ScriptedSolver {
            solution: Some(vec![1, 2, 3]),
        };
        let signals = WorkerSignals::new();
        let mut stats = None;

        let outcome = run_iteration(
            &chain,
            &mempool,
            &mut utxo,
            &mining_config(),
            &fork_config(),
            &solver,
            &signals,
            NetworkType::Regtest,
            &mut stats,
        );
        assert_eq!(outcome, IterationOutcome::Submitted);
        assert_eq!(chain.submitted_templates().len(), 1);
    }

    #[test]
    fn missing_fork_snapshot_requests_sleep_and_retry() {
        let chain = MockChain::builder()
            .with_tip(crate::interfaces::TipInfo {
                height: 999_999,
                hash: chain_primitives::Hash256::zero(),
                median_time_past: 0,
            })
            .build();
        let mempool = MockMempool::new(vec![]);
        let mut utxo = MockUtxoView::builder().build();
        let solver = ScriptedSolver { solution: None };
        let signals = WorkerSignals::new();
        let mut stats = None;

        let outcome = run_iteration(
            &chain,
            &mempool,
            &mut utxo,
            &mining_config(),
            &fork_config(),
            &solver,
            &signals,
            NetworkType::Regtest,
            &mut stats,
        );
        assert_eq!(outcome, IterationOutcome::SleepAndRetry);
    }
}
