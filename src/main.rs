use chain_primitives::{Hash256, NetworkType};
use clap::{Args, Parser, Subcommand};
use mining_core::{ChainView, EquihashSolverKind, ForkConfig, MiningConfig, MinerSupervisor, SupervisorConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

mod devnode;

use devnode::DevNode;

#[derive(Parser)]
#[command(name = "zmine")]
#[command(about = "Block-template assembly core for a proof-of-work cryptocurrency node")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the miner against an in-process devnode until a block is found.
    Mine(MineArgs),
    /// Display version information.
    Version,
}

#[derive(Args)]
struct MineArgs {
    /// Number of mining threads. Negative means "physical cores".
    #[arg(long, default_value = "1")]
    threads: i32,

    /// Destination script for the standard-mode subsidy, as hex.
    #[arg(long, default_value = "ab")]
    miner_script_hex: String,

    /// Equihash solver selector.
    #[arg(long, default_value = "default")]
    equihash_solver: String,

    /// Seconds to run before shutting the supervisor down.
    #[arg(long, default_value = "5")]
    run_seconds: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Mine(args)) => run_mine(&args),
        Some(Commands::Version) | None => show_version(),
    }
}

fn init_logging(log_level: &str) {
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn run_mine(args: &MineArgs) {
    init_logging(&args.log_level);

    let miner_script_pubkey = hex::decode(&args.miner_script_hex).unwrap_or_else(|err| {
        tracing::error!(%err, "invalid --miner-script-hex, falling back to an empty script");
        Vec::new()
    });

    let solver_kind = mining_core::resolve_solver_kind(&args.equihash_solver).unwrap_or_else(|| {
        tracing::warn!(selector = %args.equihash_solver, "unknown equihashsolver, defaulting");
        EquihashSolverKind::Default
    });

    let node = Arc::new(DevNode::new(Hash256::keccak256(b"zmine-devnode-genesis"), 0x207f_ffff));
    let mining_config = Arc::new(MiningConfig::new_clamped(
        MiningConfig::default().block_max_size,
        MiningConfig::default().block_priority_size,
        MiningConfig::default().block_min_size,
        miner_script_pubkey,
        solver_kind,
    ));
    let fork_config = Arc::new(ForkConfig {
        fork_start_height: u64::MAX,
        fork_height_range: 0,
        fork_cb_per_block: 0,
        z_utxo_mining_start_block: u64::MAX,
        snapshot_dir: std::env::temp_dir(),
        fork_sentinel: Hash256::keccak256(b"zmine-fork-sentinel"),
        hash_pid: Hash256::keccak256(b"zmine-process-identity"),
    });
    let solver = Arc::new(demo_solver::DemoSolver);

    info!(threads = args.threads, "starting miner supervisor");
    let mut supervisor = MinerSupervisor::new();
    let utxo_source = node.clone();
    supervisor.reconfigure(
        SupervisorConfig {
            enabled: true,
            thread_count: args.threads,
        },
        Arc::clone(&node),
        Arc::clone(&node),
        move || utxo_source.utxo_view(),
        mining_config,
        fork_config,
        solver,
        NetworkType::Regtest,
    );

    run_until_deadline(&node, &mut supervisor, Duration::from_secs(args.run_seconds));
    supervisor.shutdown();
    info!(height = node.tip().height, "miner supervisor stopped");
}

/// Polls the devnode's tip for `run_for`, fanning out a notification to
/// every worker each time the height advances (`spec.md` §5 "A tip-change
/// notification from the node fans out to every worker").
fn run_until_deadline(node: &DevNode, supervisor: &mut MinerSupervisor, run_for: Duration) {
    const POLL_INTERVAL: Duration = Duration::from_millis(200);
    let deadline = std::time::Instant::now() + run_for;
    let mut last_height = node.tip().height;

    while std::time::Instant::now() < deadline {
        std::thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(std::time::Instant::now())));
        let height = node.tip().height;
        if height != last_height {
            last_height = height;
            supervisor.notify_tip_changed();
        }
    }
}

fn show_version() {
    println!("zmine {}", env!("CARGO_PKG_VERSION"));
    println!("Block-template assembly core: standard mining, fork mining, mining loop driver");
}

/// Finds a trivial all-zero solution immediately, so `zmine mine` produces
/// an observable block against the devnode's near-minimum regtest
/// difficulty without a real Equihash backend wired in.
mod demo_solver {
    use mining_core::equihash::SolverCallbacks;
    use mining_core::EquihashSolverKind;

    pub struct DemoSolver;

    impl mining_core::EquihashSolver for DemoSolver {
        fn solve(&self, _input: blake2b_simd::Hash, callbacks: &mut dyn SolverCallbacks) {
            if callbacks.cancelled() {
                return;
            }
            callbacks.valid_block(&[]);
        }

        fn kind(&self) -> EquihashSolverKind {
            EquihashSolverKind::Default
        }
    }
}
