//! The bridge from vault release to capability activation.

use streak_vault_core::{DeckId, Identity, Timestamp};
use streak_vault_store::{LedgerTxn, ProgramError};

/// Activates the capability matching a released vault.
///
/// Called by [`VaultProgram::withdraw`](crate::VaultProgram::withdraw) inside
/// the same ledger transaction as the release. An error here aborts the
/// withdrawal.
pub trait Activation {
    fn activate(
        &self,
        txn: &mut dyn LedgerTxn,
        owner: &Identity,
        deck_id: &DeckId,
        now: Timestamp,
    ) -> Result<(), ProgramError>;
}
