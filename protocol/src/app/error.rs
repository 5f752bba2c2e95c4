use thiserror::Error;

use crate::codec::CodecError;
use crate::storage::StoreError;

/// Failures of the callback contract itself, as opposed to per-transaction
/// rejections (which are reported as result codes, never as errors).
///
/// Every variant except [`AppError::Storage`] and [`AppError::Halted`] means
/// the engine called out of order; the application's state is unchanged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("chain not initialized: InitChain has not been called")]
    NotInitialized,

    #[error("block {height} is still open: Commit must be called first")]
    BlockInProgress { height: u64 },

    #[error("no finalized block to commit")]
    NoBlockInProgress,

    #[error("unexpected block height: expected {expected}, got {got}")]
    UnexpectedHeight { expected: u64, got: u64 },

    /// The last committed height is `u64::MAX`; no further block exists.
    #[error("block height exhausted at {height}")]
    HeightExhausted { height: u64 },

    /// A commit failed earlier. Local state may diverge from the network, so
    /// the application refuses to go on.
    #[error("application halted after a failed commit")]
    Halted,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("encoding failure: {0}")]
    Codec(#[from] CodecError),
}
