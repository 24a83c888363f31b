//! # Streak Vault Issuer
//!
//! The credential issuer program. A capability token moves through
//! `Initialized -> Activated -> Consumed`; consuming it mints the
//! [`Credential`](streak_vault_core::Credential) for its (owner, deck).
//!
//! Activation comes either from the owner directly or from the vault
//! program when a streak is withdrawn (see [`Invoker`]).

pub mod issuer;

pub use issuer::{
    CapabilityStatus, CredentialIssuer, Invoker, IssuerConfig, CAPABILITY_RESERVATION_FEE,
};
