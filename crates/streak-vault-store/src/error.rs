//! Error types for the store module.

use streak_vault_core::{CoreError, ProtocolError};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored record failed to decode.
    #[error("corrupt record: {0}")]
    Record(#[from] CoreError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A lock guarding ledger state was poisoned by a panicking writer.
    #[error("ledger lock poisoned: {0}")]
    Poisoned(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// What a program operation fails with: a protocol rejection or a ledger
/// failure underneath it.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProgramError {
    /// The protocol rejection, if this is one.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            ProgramError::Protocol(e) => Some(e),
            ProgramError::Store(_) => None,
        }
    }
}

impl From<CoreError> for ProgramError {
    fn from(e: CoreError) -> Self {
        ProgramError::Store(StoreError::Record(e))
    }
}

impl From<rusqlite::Error> for ProgramError {
    fn from(e: rusqlite::Error) -> Self {
        ProgramError::Store(StoreError::Database(e))
    }
}
