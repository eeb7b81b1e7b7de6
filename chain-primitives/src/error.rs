use thiserror::Error;

/// Errors from the primitive layer: hashing, amount arithmetic,
/// difficulty decoding, and subsidy computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("invalid compact difficulty bits: {0:#010x}")]
    InvalidDifficultyBits(u32),

    #[error("encoding error: {0}")]
    Encoding(String),
}
