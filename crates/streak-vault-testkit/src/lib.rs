//! # Streak Vault Testkit
//!
//! Testing utilities for Streak Vault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A host over an in-memory ledger with a manual clock and
//!   funded users
//! - **Client helpers**: The common instruction flows, driven through any
//!   [`Connection`](streak_vault::Connection)
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use streak_vault_testkit::fixtures::{TestFixture, DAY};
//!
//! let fixture = TestFixture::new();
//! let alice = fixture.user(1);
//!
//! fixture.initialize_vault(&alice, "verbs", 1_000_000_000, 2).unwrap();
//! fixture.clock.advance(DAY);
//! fixture.check_in(&alice, "verbs").unwrap();
//! fixture.withdraw(&alice, "verbs").unwrap();
//! fixture.issue_credential(&alice, "verbs").unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use streak_vault_testkit::generators::VaultParams;
//!
//! proptest! {
//!     #[test]
//!     fn vault_address_is_deterministic(params: VaultParams) {
//!         prop_assert_eq!(params.vault_address(), params.vault_address());
//!     }
//! }
//! ```

pub mod client;
pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_fixtures, TestFixture, DAY, FUNDS, START};
pub use generators::VaultParams;
