//! # Streak Vault Core
//!
//! Pure primitives for Streak Vault: identities, derived addresses, ledger
//! records, and signed transactions.
//!
//! This crate contains no I/O, no storage, no clock. It is pure computation
//! over the protocol's data structures.
//!
//! ## Key Types
//!
//! - [`Identity`] - A 32-byte Ed25519 public key; also a wallet address
//! - [`Address`] - A deterministic storage address derived from (namespace, owner, deck)
//! - [`VaultEntry`] - Escrow record for a streak-gated deposit
//! - [`CapabilityToken`] - One-time permission gating credential issuance
//! - [`Credential`] - Immutable proof of protocol completion
//! - [`Transaction`] - Signed, ordered list of [`Instruction`]s
//!
//! ## Record Layout
//!
//! Every record is an 8-byte [`RecordKind`] discriminator followed by a
//! canonical CBOR map. See the [`canonical`] module.

pub mod address;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod instruction;
pub mod record;
pub mod types;

pub use address::{Address, Namespace};
pub use crypto::{Identity, Keypair, Signature};
pub use error::{CoreError, ErrorCategory, ProtocolError};
pub use instruction::{Instruction, Transaction, TransactionBuilder};
pub use record::{CapabilityState, CapabilityToken, Credential, Record, RecordKind, VaultEntry};
pub use types::{DeckId, Lamports, Timestamp, MAX_DECK_ID_LENGTH};
