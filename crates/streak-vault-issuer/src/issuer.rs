//! Capability tokens and credential issuance.

use serde::{Deserialize, Serialize};

use streak_vault_core::{
    Address, CapabilityState, CapabilityToken, Credential, DeckId, Identity, Lamports,
    ProtocolError, Record, Timestamp,
};
use streak_vault_store::{LedgerTxn, LedgerTxnExt, ProgramError, StoreError};

/// Lamports locked in a capability token's address until it is consumed.
pub const CAPABILITY_RESERVATION_FEE: Lamports = 1_300_000;

/// Configuration for the credential issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Charged at token creation, refunded when the token is consumed.
    pub reservation_fee: Lamports,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            reservation_fee: CAPABILITY_RESERVATION_FEE,
        }
    }
}

/// Who is asking for an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invoker {
    /// A signer acting directly; must be the token's owner.
    Owner(Identity),
    /// The vault program, on behalf of an owner whose streak it released.
    Vault,
}

/// Where a (owner, deck) pair is in the capability lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityStatus {
    None,
    Initialized,
    Activated { activated_at: Timestamp },
    Consumed { issued_at: Timestamp },
}

/// The issuer program.
#[derive(Debug, Clone, Default)]
pub struct CredentialIssuer {
    config: IssuerConfig,
}

impl CredentialIssuer {
    pub fn new(config: IssuerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Create an `Initialized` token owned by the caller.
    ///
    /// A deck whose credential was already issued cannot take a new token:
    /// it could never be spent.
    pub fn initialize_capability(
        &self,
        txn: &mut dyn LedgerTxn,
        caller: &Identity,
        deck_id: &str,
        now: Timestamp,
    ) -> Result<CapabilityToken, ProgramError> {
        let deck_id = DeckId::new(deck_id)?;
        let address = Address::capability(caller, &deck_id);
        if txn.exists(&address)? {
            return Err(ProtocolError::DuplicateToken.into());
        }
        if txn.exists(&Address::credential(caller, &deck_id))? {
            return Err(ProtocolError::DuplicateCredential.into());
        }

        txn.transfer(&Address::wallet(caller), &address, self.config.reservation_fee)?;

        let token = CapabilityToken::new(*caller, deck_id, now);
        txn.save(&token)?;

        tracing::debug!(owner = %caller, deck = %token.deck_id, "capability initialized");
        Ok(token)
    }

    /// Mark `owner`'s token activated.
    ///
    /// Returns `false` when the token was already active; its original
    /// activation time is kept.
    pub fn activate_capability(
        &self,
        txn: &mut dyn LedgerTxn,
        invoker: Invoker,
        owner: &Identity,
        deck_id: &str,
        now: Timestamp,
    ) -> Result<bool, ProgramError> {
        if let Invoker::Owner(caller) = invoker {
            if caller != *owner {
                return Err(ProtocolError::Unauthorized.into());
            }
        }
        let mut token = load_token(txn, owner, deck_id)?;

        if !token.activate(now) {
            tracing::debug!(owner = %owner, deck = %token.deck_id, "capability already active");
            return Ok(false);
        }
        txn.save(&token)?;

        tracing::info!(owner = %owner, deck = %token.deck_id, ?invoker, "capability activated");
        Ok(true)
    }

    /// Spend the caller's activated token and mint its credential.
    ///
    /// The token's reservation is refunded to the caller.
    pub fn issue_credential(
        &self,
        txn: &mut dyn LedgerTxn,
        caller: &Identity,
        deck_id: &str,
        now: Timestamp,
    ) -> Result<Credential, ProgramError> {
        let token = load_token(txn, caller, deck_id)?;
        if !token.is_activated() {
            return Err(ProtocolError::NotActivated.into());
        }
        let token_address = token.address();
        if txn.exists(&Address::credential(caller, &token.deck_id))? {
            return Err(ProtocolError::DuplicateCredential.into());
        }

        let credential = token.consume(now)?;
        txn.save(&credential)?;
        txn.close_account(&token_address, &Address::wallet(caller))?;

        tracing::info!(owner = %caller, deck = %credential.deck_id, "credential issued");
        Ok(credential)
    }

    /// Lifecycle position of (owner, deck).
    pub fn capability_status(
        &self,
        txn: &dyn LedgerTxn,
        owner: &Identity,
        deck_id: &DeckId,
    ) -> Result<CapabilityStatus, StoreError> {
        if let Some(token) = txn.load::<CapabilityToken>(&Address::capability(owner, deck_id))? {
            return Ok(match token.state {
                CapabilityState::Activated { activated_at } => {
                    CapabilityStatus::Activated { activated_at }
                }
                _ => CapabilityStatus::Initialized,
            });
        }
        match txn.load::<Credential>(&Address::credential(owner, deck_id))? {
            Some(credential) => Ok(CapabilityStatus::Consumed {
                issued_at: credential.issued_at,
            }),
            None => Ok(CapabilityStatus::None),
        }
    }
}

fn load_token(
    txn: &dyn LedgerTxn,
    owner: &Identity,
    deck_id: &str,
) -> Result<CapabilityToken, ProgramError> {
    let deck_id = DeckId::new(deck_id).map_err(|_| ProtocolError::NotFound)?;
    txn.load::<CapabilityToken>(&Address::capability(owner, &deck_id))?
        .ok_or_else(|| ProtocolError::NotFound.into())
}
