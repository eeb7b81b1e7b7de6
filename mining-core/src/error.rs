use thiserror::Error;

/// Error taxonomy for the block-template assembly core (`spec.md` §7).
/// Each variant documents its recovery policy at the call site that
/// produces it — see `fork_template`, `mempool_selector`,
/// `mining_loop` and `supervisor`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Soft error: the snapshot file for a target height isn't there
    /// yet. The mining loop reads this as "not ready", sleeps, and
    /// retries — never fatal.
    #[error("snapshot for height {height} not found at {path}")]
    SnapshotMissing { height: u64, path: String },

    /// Hard error for the *current* file: framing broke mid-record. The
    /// builder stops appending and emits whatever it has so far.
    #[error("snapshot at {path} is corrupt: {reason}")]
    SnapshotCorrupt { path: String, reason: String },

    /// A coinbase `script_sig` exceeded the 100-byte consensus limit;
    /// that one transaction is skipped.
    #[error("coinbase script_sig is {actual} bytes, exceeds the 100-byte limit")]
    OversizedScriptSig { actual: usize },

    /// Expected: a block/sigop cap would be exceeded by the next
    /// candidate. Selection stops, the template built so far is kept.
    #[error("{kind} cap of {cap} would be exceeded (have {current}, next adds {next})")]
    CapExceeded {
        kind: &'static str,
        cap: usize,
        current: usize,
        next: usize,
    },

    /// Fatal to the current iteration: the chain's validity probe
    /// rejected the assembled template.
    #[error("assembled template failed validity probe: {0}")]
    TemplateInvalid(String),

    /// Submit-time tip mismatch: the solved block is stale. Logged and
    /// dropped, not fatal.
    #[error("submitted block is stale: expected prev_hash {expected}, tip is now {actual}")]
    StaleBlock { expected: String, actual: String },

    /// Worker-fatal: the node ran out of reserved keys for standard-mode
    /// coinbases. The worker exits with a user-visible message.
    #[error("keypool exhausted: no reserved key available for mining")]
    KeypoolExhausted,

    /// Shutdown path: unwind and join.
    #[error("worker interrupted")]
    WorkerInterrupted,

    /// Unexpected failure; the worker logs it and exits.
    #[error("unexpected runtime error: {0}")]
    RuntimeError(String),
}

impl From<chain_primitives::ChainError> for CoreError {
    fn from(err: chain_primitives::ChainError) -> Self {
        CoreError::RuntimeError(err.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
