//! The vault state machine: initialize, check in, withdraw.
//!
//! Per (owner, deck) a vault is `Uninitialized -> Active -> Closed`. Closed
//! entries are deleted, so a closed key is indistinguishable from one that
//! was never opened and may be initialized again, unless the deck's
//! credential has already been issued.

use streak_vault_core::{
    Address, DeckId, Identity, Lamports, ProtocolError, Record, Timestamp, VaultEntry,
};
use streak_vault_store::{LedgerTxn, LedgerTxnExt, ProgramError};

use crate::activation::Activation;
use crate::config::{LatePolicy, VaultConfig};

/// Result of an accepted check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckIn {
    /// Counter after the check-in.
    pub streak_counter: u32,
    /// Whether a late check-in restarted the streak.
    pub reset: bool,
}

/// The escrow program.
pub struct VaultProgram<A: Activation> {
    config: VaultConfig,
    activation: A,
}

impl<A: Activation> VaultProgram<A> {
    pub fn new(config: VaultConfig, activation: A) -> Self {
        Self { config, activation }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Open a vault for (owner, deck) and escrow the deposit.
    ///
    /// The owner is debited `deposit_amount` plus the reservation fee.
    pub fn initialize(
        &self,
        txn: &mut dyn LedgerTxn,
        owner: &Identity,
        deck_id: &str,
        deposit_amount: Lamports,
        streak_target: u32,
        now: Timestamp,
    ) -> Result<VaultEntry, ProgramError> {
        let deck_id = DeckId::new(deck_id)?;
        if deposit_amount == 0 {
            return Err(ProtocolError::InvalidInitialDeposit.into());
        }
        if streak_target == 0 {
            return Err(ProtocolError::InvalidStreakTarget.into());
        }

        let address = Address::vault(owner, &deck_id);
        if txn.exists(&address)? {
            return Err(ProtocolError::DuplicateVault.into());
        }
        // Withdrawal activates a capability, and none can be created once
        // the credential exists.
        if txn.exists(&Address::credential(owner, &deck_id))? {
            return Err(ProtocolError::DuplicateCredential.into());
        }

        let total = deposit_amount
            .checked_add(self.config.reservation_fee)
            .ok_or(ProtocolError::Overflow)?;
        txn.transfer(&Address::wallet(owner), &address, total)?;

        let entry = VaultEntry::new(*owner, deck_id, deposit_amount, streak_target, now);
        txn.save(&entry)?;

        tracing::info!(
            owner = %owner,
            deck = %entry.deck_id,
            deposit_amount,
            streak_target,
            "vault initialized"
        );
        Ok(entry)
    }

    /// Record a check-in on an open vault.
    pub fn check_in(
        &self,
        txn: &mut dyn LedgerTxn,
        caller: &Identity,
        owner: &Identity,
        deck_id: &str,
        now: Timestamp,
    ) -> Result<CheckIn, ProgramError> {
        if caller != owner {
            return Err(ProtocolError::Unauthorized.into());
        }
        let mut entry = load_entry(txn, owner, deck_id)?;

        let elapsed = now
            .checked_sub(entry.last_check_in_time)
            .ok_or(ProtocolError::Overflow)?;
        let required = self.config.min_check_in_interval_secs;
        if elapsed < required {
            return Err(ProtocolError::TooEarly { elapsed, required }.into());
        }

        let reset = match self.config.max_check_in_interval_secs {
            Some(allowed) if elapsed > allowed => match self.config.late_policy {
                LatePolicy::Reject => {
                    return Err(ProtocolError::TooLate { elapsed, allowed }.into());
                }
                LatePolicy::Reset => {
                    entry.streak_counter = 1;
                    true
                }
            },
            _ => {
                entry.streak_counter = entry
                    .streak_counter
                    .checked_add(1)
                    .ok_or(ProtocolError::Overflow)?;
                false
            }
        };
        entry.last_check_in_time = now;
        txn.save(&entry)?;

        if reset {
            tracing::warn!(owner = %owner, deck = %entry.deck_id, elapsed, "late check-in, streak reset");
        } else {
            tracing::debug!(
                owner = %owner,
                deck = %entry.deck_id,
                streak_counter = entry.streak_counter,
                "checked in"
            );
        }
        Ok(CheckIn {
            streak_counter: entry.streak_counter,
            reset,
        })
    }

    /// Release a vault whose streak reached its target.
    ///
    /// Moves the vault's whole balance (deposit and reservation) to the owner,
    /// deletes the entry, then activates the matching capability. Returns the
    /// lamports released. If activation fails the caller must discard the
    /// transaction; nothing here is undone in place.
    pub fn withdraw(
        &self,
        txn: &mut dyn LedgerTxn,
        caller: &Identity,
        owner: &Identity,
        deck_id: &str,
        now: Timestamp,
    ) -> Result<Lamports, ProgramError> {
        if caller != owner {
            return Err(ProtocolError::Unauthorized.into());
        }
        let entry = load_entry(txn, owner, deck_id)?;
        if !entry.target_met() {
            return Err(ProtocolError::StreakTargetNotMet {
                counter: entry.streak_counter,
                target: entry.streak_target,
            }
            .into());
        }

        let released = txn.close_account(&entry.address(), &Address::wallet(owner))?;
        self.activation.activate(txn, owner, &entry.deck_id, now)?;

        tracing::info!(owner = %owner, deck = %entry.deck_id, released, "vault withdrawn");
        Ok(released)
    }
}

/// An unparseable deck id cannot name an existing vault.
fn load_entry(
    txn: &dyn LedgerTxn,
    owner: &Identity,
    deck_id: &str,
) -> Result<VaultEntry, ProgramError> {
    let deck_id = DeckId::new(deck_id).map_err(|_| ProtocolError::NotFound)?;
    txn.load::<VaultEntry>(&Address::vault(owner, &deck_id))?
        .ok_or_else(|| ProtocolError::NotFound.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use streak_vault_core::{Credential, Keypair};
    use streak_vault_store::{Ledger, MemoryLedger};

    const START: Timestamp = 1_700_000_000;
    const DAY: i64 = 24 * 60 * 60;
    const FUNDS: Lamports = 55_000_000_000;
    const DEPOSIT: Lamports = 1_000_000_000;

    /// Records every activation it is asked to perform.
    #[derive(Default)]
    struct RecordingActivation {
        calls: Mutex<Vec<(Identity, DeckId, Timestamp)>>,
    }

    impl Activation for RecordingActivation {
        fn activate(
            &self,
            _txn: &mut dyn LedgerTxn,
            owner: &Identity,
            deck_id: &DeckId,
            now: Timestamp,
        ) -> Result<(), ProgramError> {
            self.calls
                .lock()
                .unwrap()
                .push((*owner, deck_id.clone(), now));
            Ok(())
        }
    }

    /// Always fails, as activation does when no capability token exists.
    struct FailingActivation;

    impl Activation for FailingActivation {
        fn activate(
            &self,
            _txn: &mut dyn LedgerTxn,
            _owner: &Identity,
            _deck_id: &DeckId,
            _now: Timestamp,
        ) -> Result<(), ProgramError> {
            Err(ProtocolError::NotFound.into())
        }
    }

    fn setup<A: Activation>(activation: A) -> (VaultProgram<A>, MemoryLedger, Identity) {
        setup_with(VaultConfig::default(), activation)
    }

    fn setup_with<A: Activation>(
        config: VaultConfig,
        activation: A,
    ) -> (VaultProgram<A>, MemoryLedger, Identity) {
        let owner = Keypair::from_seed(&[1; 32]).identity();
        let ledger = MemoryLedger::new();
        ledger.fund(&Address::wallet(&owner), FUNDS).unwrap();
        (VaultProgram::new(config, activation), ledger, owner)
    }

    fn protocol_err<T: std::fmt::Debug>(result: Result<T, ProgramError>) -> ProtocolError {
        match result.unwrap_err() {
            ProgramError::Protocol(e) => e,
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    fn entry(ledger: &MemoryLedger, owner: &Identity, deck: &str) -> Option<VaultEntry> {
        ledger
            .load(&Address::vault(owner, &DeckId::new(deck).unwrap()))
            .unwrap()
    }

    #[test]
    fn test_initialize() {
        let (program, ledger, owner) = setup(RecordingActivation::default());

        let created = ledger
            .transact(|txn| program.initialize(txn, &owner, "kanji", DEPOSIT, 3, START))
            .unwrap();

        assert_eq!(created.streak_counter, 1);
        assert_eq!(created.start_time, START);
        assert_eq!(created.last_check_in_time, created.start_time);
        assert_eq!(entry(&ledger, &owner, "kanji"), Some(created.clone()));

        let fee = program.config().reservation_fee;
        assert_eq!(
            ledger.balance(&Address::wallet(&owner)).unwrap(),
            FUNDS - DEPOSIT - fee
        );
        assert_eq!(ledger.balance(&created.address()).unwrap(), DEPOSIT + fee);
    }

    #[test]
    fn test_initialize_validation() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        let too_long = "x".repeat(33);

        let cases = [
            ("", DEPOSIT, 1, ProtocolError::InvalidDeckId),
            (too_long.as_str(), DEPOSIT, 1, ProtocolError::InvalidDeckId),
            ("deck", 0, 1, ProtocolError::InvalidInitialDeposit),
            ("deck", DEPOSIT, 0, ProtocolError::InvalidStreakTarget),
        ];
        for (deck, deposit, target, expected) in cases {
            let err = protocol_err(
                ledger.transact(|txn| program.initialize(txn, &owner, deck, deposit, target, START)),
            );
            assert_eq!(err, expected);
        }

        assert!(ledger.records_by_kind(VaultEntry::KIND).unwrap().is_empty());
        assert_eq!(ledger.balance(&Address::wallet(&owner)).unwrap(), FUNDS);
    }

    #[test]
    fn test_initialize_insufficient_funds() {
        let (program, ledger, owner) = setup(RecordingActivation::default());

        let err = protocol_err(
            ledger.transact(|txn| program.initialize(txn, &owner, "deck", FUNDS, 1, START)),
        );
        assert!(matches!(err, ProtocolError::InsufficientFunds { available, .. } if available == FUNDS));
        assert_eq!(entry(&ledger, &owner, "deck"), None);
    }

    #[test]
    fn test_duplicate_vault() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 2, START))
            .unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 5, START + 1)),
        );
        assert_eq!(err, ProtocolError::DuplicateVault);
        assert_eq!(entry(&ledger, &owner, "deck").unwrap().streak_target, 2);
    }

    #[test]
    fn test_independent_keys() {
        let (program, ledger, alice) = setup(RecordingActivation::default());
        let bob = Keypair::from_seed(&[2; 32]).identity();
        ledger.fund(&Address::wallet(&bob), FUNDS).unwrap();

        ledger
            .transact(|txn| {
                program.initialize(txn, &alice, "one", DEPOSIT, 2, START)?;
                program.initialize(txn, &alice, "two", DEPOSIT, 2, START)?;
                program.initialize(txn, &bob, "one", DEPOSIT, 2, START)
            })
            .unwrap();

        let all = ledger.view(|txn| txn.load_all::<VaultEntry>()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_check_in() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 3, START))
            .unwrap();

        let now = START + DAY;
        let result = ledger
            .transact(|txn| program.check_in(txn, &owner, &owner, "deck", now))
            .unwrap();
        assert_eq!(
            result,
            CheckIn {
                streak_counter: 2,
                reset: false
            }
        );

        let stored = entry(&ledger, &owner, "deck").unwrap();
        assert_eq!(stored.streak_counter, 2);
        assert!(stored.last_check_in_time > stored.start_time);
    }

    #[test]
    fn test_check_in_unauthorized() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        let mallory = Keypair::from_seed(&[66; 32]).identity();
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 3, START))
            .unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.check_in(txn, &mallory, &owner, "deck", START + DAY)),
        );
        assert_eq!(err, ProtocolError::Unauthorized);
        assert_eq!(entry(&ledger, &owner, "deck").unwrap().streak_counter, 1);
    }

    #[test]
    fn test_check_in_too_early() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 3, START))
            .unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.check_in(txn, &owner, &owner, "deck", START + 3_600)),
        );
        assert_eq!(
            err,
            ProtocolError::TooEarly {
                elapsed: 3_600,
                required: 72_000
            }
        );

        // Exactly the minimum interval is accepted.
        ledger
            .transact(|txn| program.check_in(txn, &owner, &owner, "deck", START + 72_000))
            .unwrap();
    }

    #[test]
    fn test_check_in_missing_vault() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        let err = protocol_err(
            ledger.transact(|txn| program.check_in(txn, &owner, &owner, "nothing", START)),
        );
        assert_eq!(err, ProtocolError::NotFound);
    }

    #[test]
    fn test_late_check_in_resets() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        ledger
            .transact(|txn| {
                program.initialize(txn, &owner, "deck", DEPOSIT, 5, START)?;
                program.check_in(txn, &owner, &owner, "deck", START + DAY)
            })
            .unwrap();

        let late = START + DAY + 3 * DAY;
        let result = ledger
            .transact(|txn| program.check_in(txn, &owner, &owner, "deck", late))
            .unwrap();
        assert!(result.reset);
        assert_eq!(result.streak_counter, 1);

        let stored = entry(&ledger, &owner, "deck").unwrap();
        assert_eq!(stored.streak_counter, 1);
        assert_eq!(stored.last_check_in_time, late);
    }

    #[test]
    fn test_late_check_in_rejected() {
        let config = VaultConfig {
            late_policy: LatePolicy::Reject,
            ..VaultConfig::default()
        };
        let (program, ledger, owner) = setup_with(config, RecordingActivation::default());
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 5, START))
            .unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.check_in(txn, &owner, &owner, "deck", START + 3 * DAY)),
        );
        assert_eq!(
            err,
            ProtocolError::TooLate {
                elapsed: 3 * DAY,
                allowed: 2 * DAY
            }
        );
        assert_eq!(entry(&ledger, &owner, "deck").unwrap().last_check_in_time, START);
    }

    #[test]
    fn test_unbounded_window() {
        let config = VaultConfig {
            max_check_in_interval_secs: None,
            ..VaultConfig::default()
        };
        let (program, ledger, owner) = setup_with(config, RecordingActivation::default());
        let result = ledger
            .transact(|txn| {
                program.initialize(txn, &owner, "deck", DEPOSIT, 5, START)?;
                program.check_in(txn, &owner, &owner, "deck", START + 30 * DAY)
            })
            .unwrap();
        assert_eq!(result.streak_counter, 2);
    }

    #[test]
    fn test_withdraw_below_target() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 2, START))
            .unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.withdraw(txn, &owner, &owner, "deck", START + DAY)),
        );
        assert_eq!(
            err,
            ProtocolError::StreakTargetNotMet {
                counter: 1,
                target: 2
            }
        );
        assert!(entry(&ledger, &owner, "deck").is_some());
        assert!(program.activation.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_withdraw_unauthorized() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        let mallory = Keypair::from_seed(&[66; 32]).identity();
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 1, START))
            .unwrap();
        let before = ledger.balance(&Address::wallet(&owner)).unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.withdraw(txn, &mallory, &owner, "deck", START)),
        );
        assert_eq!(err, ProtocolError::Unauthorized);
        assert_eq!(ledger.balance(&Address::wallet(&owner)).unwrap(), before);
        assert_eq!(ledger.balance(&Address::wallet(&mallory)).unwrap(), 0);
    }

    #[test]
    fn test_withdraw_releases_and_activates() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        ledger
            .transact(|txn| {
                program.initialize(txn, &owner, "deck", DEPOSIT, 2, START)?;
                program.check_in(txn, &owner, &owner, "deck", START + DAY)
            })
            .unwrap();

        let released = ledger
            .transact(|txn| program.withdraw(txn, &owner, &owner, "deck", START + DAY + 10))
            .unwrap();

        assert_eq!(released, DEPOSIT + program.config().reservation_fee);
        assert_eq!(ledger.balance(&Address::wallet(&owner)).unwrap(), FUNDS);
        assert_eq!(entry(&ledger, &owner, "deck"), None);

        let calls = program.activation.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, owner);
        assert_eq!(calls[0].1.as_str(), "deck");
        assert_eq!(calls[0].2, START + DAY + 10);
    }

    #[test]
    fn test_failed_activation_aborts_withdraw() {
        let (program, ledger, owner) = setup(FailingActivation);
        ledger
            .transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 1, START))
            .unwrap();
        let before = ledger.balance(&Address::wallet(&owner)).unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.withdraw(txn, &owner, &owner, "deck", START)),
        );
        assert_eq!(err, ProtocolError::NotFound);
        assert!(entry(&ledger, &owner, "deck").is_some());
        assert_eq!(ledger.balance(&Address::wallet(&owner)).unwrap(), before);
    }

    #[test]
    fn test_reinitialize_after_withdraw() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        ledger
            .transact(|txn| {
                program.initialize(txn, &owner, "deck", DEPOSIT, 1, START)?;
                program.withdraw(txn, &owner, &owner, "deck", START)?;
                program.initialize(txn, &owner, "deck", DEPOSIT, 4, START + 1)
            })
            .unwrap();
        assert_eq!(entry(&ledger, &owner, "deck").unwrap().streak_target, 4);
    }

    #[test]
    fn test_initialize_after_credential_rejected() {
        let (program, ledger, owner) = setup(RecordingActivation::default());
        let credential = Credential {
            owner,
            deck_id: DeckId::new("deck").unwrap(),
            issued_at: START,
        };
        ledger
            .transact(|txn| txn.save(&credential).map_err(Into::into))
            .unwrap();

        let err = protocol_err(
            ledger.transact(|txn| program.initialize(txn, &owner, "deck", DEPOSIT, 1, START)),
        );
        assert_eq!(err, ProtocolError::DuplicateCredential);
        assert!(entry(&ledger, &owner, "deck").is_none());
        assert_eq!(ledger.balance(&Address::wallet(&owner)).unwrap(), FUNDS);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rejected_initialize_leaves_ledger_unchanged(
                deck in prop_oneof![Just(String::new()), "[a-z]{33,40}", "[a-z]{1,8}"],
                deposit in prop_oneof![Just(0u64), 1u64..=FUNDS * 2],
                target in 0u32..4,
            ) {
                let (program, ledger, owner) = setup(RecordingActivation::default());
                let result = ledger.transact(|txn| {
                    program.initialize(txn, &owner, &deck, deposit, target, START)
                });

                if result.is_err() {
                    prop_assert_eq!(ledger.balance(&Address::wallet(&owner)).unwrap(), FUNDS);
                    prop_assert!(ledger.records_by_kind(VaultEntry::KIND).unwrap().is_empty());
                } else {
                    prop_assert_eq!(ledger.records_by_kind(VaultEntry::KIND).unwrap().len(), 1);
                }
            }
        }
    }
}
