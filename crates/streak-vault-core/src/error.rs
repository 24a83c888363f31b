//! Error types for Streak Vault Core.

use thiserror::Error;

/// Errors in encoding, decoding, and signature handling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("record discriminator mismatch: expected {expected}, got {actual}")]
    DiscriminatorMismatch { expected: String, actual: String },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("non-canonical encoding")]
    NonCanonical,

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Protocol rejections.
///
/// Every rejected operation returns exactly one of these, synchronously, and
/// leaves the ledger unchanged. Each variant has a distinct, stable numeric
/// code (see [`ProtocolError::code`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid deck id")]
    InvalidDeckId,

    #[error("invalid initial deposit amount")]
    InvalidInitialDeposit,

    #[error("invalid streak target")]
    InvalidStreakTarget,

    #[error("caller is not the owner")]
    Unauthorized,

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("check-in is too early: {elapsed}s elapsed, {required}s required")]
    TooEarly { elapsed: i64, required: i64 },

    #[error("check-in is too late: {elapsed}s elapsed, at most {allowed}s allowed")]
    TooLate { elapsed: i64, allowed: i64 },

    #[error("vault already exists for this deck")]
    DuplicateVault,

    #[error("capability token already exists for this deck")]
    DuplicateToken,

    #[error("streak target not met: {counter} of {target}")]
    StreakTargetNotMet { counter: u32, target: u32 },

    #[error("capability token is not activated")]
    NotActivated,

    #[error("record not found")]
    NotFound,

    #[error("credential already issued for this deck")]
    DuplicateCredential,

    #[error("arithmetic overflow")]
    Overflow,
}

/// Coarse classification of protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Authorization,
    Resourcing,
    Timing,
    StateConflict,
    Arithmetic,
}

impl ProtocolError {
    /// Stable numeric code, unique per variant.
    pub fn code(&self) -> u32 {
        match self {
            ProtocolError::InvalidDeckId => 6000,
            ProtocolError::InvalidInitialDeposit => 6001,
            ProtocolError::InvalidStreakTarget => 6002,
            ProtocolError::Unauthorized => 6003,
            ProtocolError::InsufficientFunds { .. } => 6004,
            ProtocolError::TooEarly { .. } => 6005,
            ProtocolError::TooLate { .. } => 6006,
            ProtocolError::DuplicateVault => 6007,
            ProtocolError::DuplicateToken => 6008,
            ProtocolError::StreakTargetNotMet { .. } => 6009,
            ProtocolError::NotActivated => 6010,
            ProtocolError::NotFound => 6011,
            ProtocolError::DuplicateCredential => 6012,
            ProtocolError::Overflow => 6013,
        }
    }

    /// The category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProtocolError::InvalidDeckId
            | ProtocolError::InvalidInitialDeposit
            | ProtocolError::InvalidStreakTarget => ErrorCategory::Validation,
            ProtocolError::Unauthorized => ErrorCategory::Authorization,
            ProtocolError::InsufficientFunds { .. } => ErrorCategory::Resourcing,
            ProtocolError::TooEarly { .. } | ProtocolError::TooLate { .. } => {
                ErrorCategory::Timing
            }
            ProtocolError::DuplicateVault
            | ProtocolError::DuplicateToken
            | ProtocolError::StreakTargetNotMet { .. }
            | ProtocolError::NotActivated
            | ProtocolError::NotFound
            | ProtocolError::DuplicateCredential => ErrorCategory::StateConflict,
            ProtocolError::Overflow => ErrorCategory::Arithmetic,
        }
    }
}
