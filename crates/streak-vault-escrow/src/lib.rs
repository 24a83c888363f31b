//! # Streak Vault Escrow
//!
//! The vault program: a deposit held in escrow until its owner has checked
//! in `streak_target` times, each check-in at least
//! [`VaultConfig::min_check_in_interval_secs`] after the previous one.
//!
//! Withdrawal hands control to an [`Activation`] inside the same ledger
//! transaction, so releasing the deposit and activating the owner's
//! capability either both happen or neither does.

pub mod activation;
pub mod config;
pub mod program;

pub use activation::Activation;
pub use config::{
    LatePolicy, VaultConfig, MAX_CHECK_IN_INTERVAL_SECS, MIN_CHECK_IN_INTERVAL_SECS,
    VAULT_RESERVATION_FEE,
};
pub use program::{CheckIn, VaultProgram};
