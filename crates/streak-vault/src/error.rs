//! Error types for the host.

use streak_vault_core::{CoreError, ProtocolError, Timestamp};
use streak_vault_store::{ProgramError, StoreError};
use thiserror::Error;

/// Errors that can occur when submitting a transaction or querying the host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The transaction's signature does not verify against its signer.
    #[error("invalid transaction signature: {0}")]
    InvalidSignature(#[source] CoreError),

    /// The transaction was issued too far from the host's current time.
    #[error("stale transaction: issued at {issued_at}, host time {now}")]
    Stale { issued_at: Timestamp, now: Timestamp },

    /// A transaction could not be encoded for signing.
    #[error("transaction encoding error: {0}")]
    Encoding(#[from] CoreError),

    /// The same signed transaction was already accepted.
    #[error("duplicate transaction {0}")]
    Duplicate(String),

    /// The transaction carries no instructions.
    #[error("transaction has no instructions")]
    Empty,

    /// An instruction failed; the whole transaction was rolled back.
    #[error("instruction {index} failed: {source}")]
    InstructionFailed {
        index: usize,
        #[source]
        source: ProgramError,
    },

    /// The ledger failed outside any instruction (locking, commit).
    #[error("ledger error: {0}")]
    Ledger(ProgramError),

    /// Storage error on a query.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(String),
}

impl HostError {
    /// The protocol rejection behind this error, if any.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            HostError::InstructionFailed { source, .. } => source.protocol(),
            _ => None,
        }
    }
}

/// Errors loading a [`HostConfig`](crate::HostConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
