//! Block-template assembly core: mempool selection (standard mining
//! mode), UTXO-snapshot-backed synthetic coinbases (fork mining mode),
//! and the mining loop that drives an external Equihash solver against
//! either.

pub mod coinbase;
pub mod config;
pub mod equihash;
pub mod error;
pub mod fork_template;
pub mod header;
pub mod interfaces;
pub mod mempool_selector;
pub mod mining_loop;
pub mod snapshot;
pub mod standard_template;
pub mod supervisor;
pub mod template;
pub mod transaction;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use coinbase::{apply_doubling_rule, build_shielded_coinbase, build_standard_coinbase, build_transparent_coinbase};
pub use config::{EquihashSolverKind, ForkConfig, MiningConfig};
pub use equihash::{resolve_solver_kind, EquihashSolver, SolverCallbacks};
pub use error::{CoreError, CoreResult};
pub use fork_template::build_fork_template;
pub use header::{update_time, BlockHeader};
pub use interfaces::{ChainView, MempoolView, TipInfo, UtxoView};
pub use mempool_selector::{select, MempoolEntry, SelectionResult};
pub use mining_loop::{run_iteration, worker_loop, ExtraNonceState, IterationOutcome, WorkerSignals};
pub use snapshot::{utxo_file_name, SnapshotReader, SnapshotRecord};
pub use standard_template::{build_standard_template, StandardBuildStats};
pub use supervisor::{MinerSupervisor, SupervisorConfig};
pub use template::{merkle_root, BlockTemplate};
pub use transaction::{Input, Output, Transaction};
