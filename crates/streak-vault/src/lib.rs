//! # Streak Vault
//!
//! A streak-gated escrow and a one-time credential issuer, run by one ledger
//! host that commits every transaction atomically.
//!
//! ## Overview
//!
//! - **Vault**: a user escrows a deposit for a deck and must check in
//!   `streak_target` times, at least 20 hours apart, before withdrawing it.
//! - **Issuer**: a capability token, once activated, can be spent exactly
//!   once to mint a credential for the deck.
//! - **Bridge**: withdrawing a vault activates the matching capability in the
//!   same transaction. If activation fails, the withdrawal never happened.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use streak_vault::{Host, HostConfig};
//! use streak_vault::core::{Instruction, Keypair, TransactionBuilder};
//! use streak_vault::store::{SqliteLedger, SystemClock};
//!
//! async fn example() {
//!     let ledger = SqliteLedger::open("ledger.db").unwrap();
//!     let host = Host::new(ledger, Arc::new(SystemClock), HostConfig::default()).unwrap();
//!
//!     let keypair = Keypair::generate();
//!     host.airdrop(&keypair.identity(), 5_000_000_000).unwrap();
//!
//!     let tx = TransactionBuilder::new(keypair.identity())
//!         .issued_at(host.now())
//!         .instruction(Instruction::InitializeVault {
//!             deck_id: "spanish-verbs".into(),
//!             deposit_amount: 1_000_000_000,
//!             streak_target: 7,
//!         })
//!         .sign(&keypair)
//!         .unwrap();
//!
//!     host.submit(tx).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `streak_vault::core` - Identities, addresses, records, transactions
//! - `streak_vault::store` - Ledger trait, SQLite and memory ledgers, clocks
//! - `streak_vault::escrow` - The vault program
//! - `streak_vault::issuer` - The credential issuer program

pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod host;

pub use streak_vault_core as core;
pub use streak_vault_escrow as escrow;
pub use streak_vault_issuer as issuer;
pub use streak_vault_store as store;

pub use bridge::IssuerBridge;
pub use config::{HostConfig, DEFAULT_MAX_TRANSACTION_AGE_SECS};
pub use connection::Connection;
pub use error::{ConfigError, HostError, Result};
pub use host::{Host, Outcome};

pub use streak_vault_core::{
    Address, CapabilityState, CapabilityToken, Credential, DeckId, Identity, Instruction,
    Keypair, ProtocolError, Transaction, TransactionBuilder, VaultEntry,
};
pub use streak_vault_issuer::CapabilityStatus;
