//! The atomic bridge from vault withdrawal to capability activation.

use streak_vault_core::{DeckId, Identity, Timestamp};
use streak_vault_escrow::Activation;
use streak_vault_issuer::{CredentialIssuer, Invoker};
use streak_vault_store::{LedgerTxn, ProgramError};

/// Routes the vault's activation call into the credential issuer.
///
/// The call runs on the withdrawal's own ledger transaction, so a failed
/// activation rolls the withdrawal back with it.
#[derive(Debug, Clone)]
pub struct IssuerBridge {
    issuer: CredentialIssuer,
}

impl IssuerBridge {
    pub fn new(issuer: CredentialIssuer) -> Self {
        Self { issuer }
    }
}

impl Activation for IssuerBridge {
    fn activate(
        &self,
        txn: &mut dyn LedgerTxn,
        owner: &Identity,
        deck_id: &DeckId,
        now: Timestamp,
    ) -> Result<(), ProgramError> {
        self.issuer
            .activate_capability(txn, Invoker::Vault, owner, deck_id.as_str(), now)
            .map(|_| ())
    }
}
