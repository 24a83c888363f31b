//! The Host: runs signed transactions against a ledger.
//!
//! The host owns the ledger, the clock, and both programs. Every transaction
//! executes as one ledger transaction; the first failing instruction rolls
//! back everything the transaction did.
//!
//! A signed transaction runs at most once. The host remembers the id of
//! every transaction that passed its signature and freshness checks until
//! its `issued_at` falls out of the freshness window, after which the
//! staleness check rejects it anyway.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use streak_vault_core::{
    Address, CapabilityToken, Credential, DeckId, Identity, Instruction, Lamports, Timestamp,
    Transaction, VaultEntry,
};
use streak_vault_escrow::{CheckIn, VaultProgram};
use streak_vault_issuer::{CapabilityStatus, CredentialIssuer, Invoker};
use streak_vault_store::{Clock, Ledger, LedgerTxn, LedgerTxnExt, ProgramError, StoreError};

use crate::bridge::IssuerBridge;
use crate::config::HostConfig;
use crate::error::{ConfigError, HostError, Result};

/// What one successful instruction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    VaultInitialized(VaultEntry),
    CheckedIn(CheckIn),
    Withdrawn { released: Lamports },
    CapabilityInitialized(CapabilityToken),
    CapabilityActivated { changed: bool },
    CredentialIssued(Credential),
}

/// The ledger host.
///
/// Cheap to clone; clones share the ledger, clock, and programs.
pub struct Host<L: Ledger> {
    inner: Arc<HostInner<L>>,
}

struct HostInner<L> {
    ledger: L,
    clock: Arc<dyn Clock>,
    config: HostConfig,
    vault: VaultProgram<IssuerBridge>,
    issuer: CredentialIssuer,
    /// Ids of recently accepted transactions, with their `issued_at`.
    seen: Mutex<HashMap<[u8; 32], Timestamp>>,
}

impl<L: Ledger> Clone for Host<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Ledger> Host<L> {
    /// Create a host over a ledger. The config is validated first.
    pub fn new(
        ledger: L,
        clock: Arc<dyn Clock>,
        config: HostConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let issuer = CredentialIssuer::new(config.issuer.clone());
        let vault = VaultProgram::new(config.vault.clone(), IssuerBridge::new(issuer.clone()));
        Ok(Self {
            inner: Arc::new(HostInner {
                ledger,
                clock,
                config,
                vault,
                issuer,
                seen: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn ledger(&self) -> &L {
        &self.inner.ledger
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// Current host time.
    pub fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify and execute a transaction on the calling thread.
    pub fn execute(&self, tx: &Transaction) -> Result<Vec<Outcome>> {
        if tx.instructions.is_empty() {
            return Err(HostError::Empty);
        }
        tx.verify().map_err(HostError::InvalidSignature)?;

        let now = self.now();
        let age = now.abs_diff(tx.issued_at);
        if age > self.inner.config.max_transaction_age_secs.unsigned_abs() {
            return Err(HostError::Stale {
                issued_at: tx.issued_at,
                now,
            });
        }
        self.remember(tx, now)?;

        let signer = tx.signer;
        let mut failed_at = None;
        let result = self.inner.ledger.transact(|txn| {
            let mut outcomes = Vec::with_capacity(tx.instructions.len());
            for (index, instruction) in tx.instructions.iter().enumerate() {
                failed_at = Some(index);
                outcomes.push(self.dispatch(txn, &signer, instruction, now)?);
            }
            failed_at = None;
            Ok(outcomes)
        });

        match (result, failed_at) {
            (Ok(outcomes), _) => {
                tracing::debug!(
                    signer = %signer,
                    instructions = outcomes.len(),
                    "transaction committed"
                );
                Ok(outcomes)
            }
            (Err(source), Some(index)) => {
                tracing::info!(
                    signer = %signer,
                    index,
                    instruction = tx.instructions[index].name(),
                    error = %source,
                    "transaction rolled back"
                );
                Err(HostError::InstructionFailed { index, source })
            }
            (Err(e), None) => Err(HostError::Ledger(e)),
        }
    }

    /// Verify and execute a transaction on the blocking thread pool.
    pub async fn submit(&self, tx: Transaction) -> Result<Vec<Outcome>> {
        let host = self.clone();
        tokio::task::spawn_blocking(move || host.execute(&tx))
            .await
            .map_err(|e| HostError::Join(e.to_string()))?
    }

    /// Record `tx` as accepted, refusing one already seen in the window.
    fn remember(&self, tx: &Transaction, now: Timestamp) -> Result<()> {
        let id = tx.id()?;
        let window = self.inner.config.max_transaction_age_secs;
        let mut seen = self
            .inner
            .seen
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        seen.retain(|_, issued_at| now.saturating_sub(*issued_at) <= window);
        if seen.contains_key(&id) {
            tracing::warn!(signer = %tx.signer, id = %hex::encode(id), "duplicate transaction");
            return Err(HostError::Duplicate(hex::encode(id)));
        }
        seen.insert(id, tx.issued_at);
        Ok(())
    }

    fn dispatch(
        &self,
        txn: &mut dyn LedgerTxn,
        signer: &Identity,
        instruction: &Instruction,
        now: Timestamp,
    ) -> std::result::Result<Outcome, ProgramError> {
        let vault = &self.inner.vault;
        let issuer = &self.inner.issuer;

        match instruction {
            Instruction::InitializeVault {
                deck_id,
                deposit_amount,
                streak_target,
            } => vault
                .initialize(txn, signer, deck_id, *deposit_amount, *streak_target, now)
                .map(Outcome::VaultInitialized),
            Instruction::CheckIn { owner, deck_id } => vault
                .check_in(txn, signer, owner, deck_id, now)
                .map(Outcome::CheckedIn),
            Instruction::Withdraw { owner, deck_id } => vault
                .withdraw(txn, signer, owner, deck_id, now)
                .map(|released| Outcome::Withdrawn { released }),
            Instruction::InitializeCapability { deck_id } => issuer
                .initialize_capability(txn, signer, deck_id, now)
                .map(Outcome::CapabilityInitialized),
            Instruction::ActivateCapability { owner, deck_id } => issuer
                .activate_capability(txn, Invoker::Owner(*signer), owner, deck_id, now)
                .map(|changed| Outcome::CapabilityActivated { changed }),
            Instruction::IssueCredential { deck_id } => issuer
                .issue_credential(txn, signer, deck_id, now)
                .map(Outcome::CredentialIssued),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Lamports held at an address.
    pub fn balance(&self, address: &Address) -> Result<Lamports> {
        Ok(self.inner.ledger.balance(address)?)
    }

    /// Lamports in an identity's wallet.
    pub fn wallet_balance(&self, identity: &Identity) -> Result<Lamports> {
        self.balance(&Address::wallet(identity))
    }

    pub fn vault_entry(&self, owner: &Identity, deck_id: &DeckId) -> Result<Option<VaultEntry>> {
        Ok(self.inner.ledger.load(&Address::vault(owner, deck_id))?)
    }

    pub fn capability_token(
        &self,
        owner: &Identity,
        deck_id: &DeckId,
    ) -> Result<Option<CapabilityToken>> {
        Ok(self.inner.ledger.load(&Address::capability(owner, deck_id))?)
    }

    pub fn credential(&self, owner: &Identity, deck_id: &DeckId) -> Result<Option<Credential>> {
        Ok(self.inner.ledger.load(&Address::credential(owner, deck_id))?)
    }

    pub fn capability_status(
        &self,
        owner: &Identity,
        deck_id: &DeckId,
    ) -> Result<CapabilityStatus> {
        let issuer = &self.inner.issuer;
        Ok(self
            .inner
            .ledger
            .view(|txn| issuer.capability_status(txn, owner, deck_id))?)
    }

    /// Every open vault entry, found by discriminator.
    pub fn vault_entries(&self) -> Result<Vec<VaultEntry>> {
        Ok(self.inner.ledger.view(|txn| txn.load_all())?)
    }

    /// Every outstanding capability token.
    pub fn capability_tokens(&self) -> Result<Vec<CapabilityToken>> {
        Ok(self.inner.ledger.view(|txn| txn.load_all())?)
    }

    /// Every issued credential.
    pub fn credentials(&self) -> Result<Vec<Credential>> {
        Ok(self.inner.ledger.view(|txn| txn.load_all())?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Setup
    // ─────────────────────────────────────────────────────────────────────────

    /// Mint lamports into an identity's wallet.
    pub fn airdrop(&self, identity: &Identity, amount: Lamports) -> Result<()> {
        self.inner
            .ledger
            .fund(&Address::wallet(identity), amount)
            .map_err(HostError::Ledger)?;
        tracing::debug!(recipient = %identity, amount, "airdrop");
        Ok(())
    }
}
