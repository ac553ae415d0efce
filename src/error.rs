//! Error types shared by the ledger, mempool and storage layers.

use thiserror::Error;

/// Failures of the persistence collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure in the file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Block key that is not a hex hash
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}

/// Chain-level failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A `prev_hash` link (or the tip) points at a block the store does not have.
    #[error("block {0} is missing from storage")]
    MissingBlock(String),

    /// A stored block no longer re-derives its hash or fails its own difficulty.
    #[error("block {0} failed hash/proof-of-work verification")]
    CorruptBlock(String),

    /// A candidate block was refused by `append`.
    #[error("invalid block: {0}")]
    InvalidBlock(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Reasons a transfer never makes it into the mempool.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("amount must be > 0")]
    InvalidAmount,

    #[error("input {index} has an invalid signature: {reason}")]
    InvalidSignature { index: usize, reason: &'static str },

    #[error("reward transactions cannot be submitted")]
    CoinbaseSubmission,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Bad environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
