//! # Streak Vault Store
//!
//! The ledger the Streak Vault programs run against: addressed records,
//! lamport balances, and atomic transactions over both.
//!
//! ## Overview
//!
//! Programs receive a [`LedgerTxn`] and never see the backend. A [`Ledger`]
//! runs each closure passed to [`Ledger::transact`] as one atomic unit: if
//! the closure returns an error, no write it made is visible afterwards.
//! The primary implementation is [`SqliteLedger`], with [`MemoryLedger`]
//! for tests.
//!
//! ## Key Types
//!
//! - [`Ledger`] - Runs atomic transactions and serves committed reads
//! - [`LedgerTxn`] - The view a program reads and writes through
//! - [`LedgerTxnExt`] - Typed record access, transfers, account closing
//! - [`SqliteLedger`] - SQLite-backed persistent ledger
//! - [`MemoryLedger`] - In-memory ledger for tests
//! - [`Clock`] - Source of the `now` passed into programs
//! - [`ProgramError`] - Protocol rejection or store failure
//!
//! ## Usage
//!
//! ```rust,no_run
//! use streak_vault_core::Address;
//! use streak_vault_store::{Ledger, LedgerTxnExt, SqliteLedger};
//!
//! let ledger = SqliteLedger::open("ledger.db").unwrap();
//! let alice = Address::from_bytes([1; 32]);
//! let bob = Address::from_bytes([2; 32]);
//!
//! ledger.fund(&alice, 1_000).unwrap();
//! ledger.transact(|txn| txn.transfer(&alice, &bob, 250)).unwrap();
//! ```

pub mod clock;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ProgramError, Result, StoreError};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::{Ledger, LedgerTxn, LedgerTxnExt, MAX_BALANCE};
