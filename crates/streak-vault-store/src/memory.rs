//! In-memory implementation of the Ledger trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite,
//! including the [`MAX_BALANCE`] ceiling, but keeps everything in memory
//! with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use streak_vault_core::{Address, Lamports, RecordKind};

use crate::error::{ProgramError, Result, StoreError};
use crate::traits::{Ledger, LedgerTxn, MAX_BALANCE};

/// In-memory ledger implementation.
///
/// All data is lost when the ledger is dropped. Thread-safe via RwLock;
/// transactions hold the write lock for their whole duration.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

#[derive(Default)]
struct MemoryLedgerInner {
    /// Record bytes by address.
    records: BTreeMap<Address, Vec<u8>>,

    /// Lamports by address. Absent means zero.
    balances: BTreeMap<Address, Lamports>,
}

impl MemoryLedger {
    /// Create a new empty in-memory ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner::default()),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// A transaction buffers writes in an overlay over the committed state.
struct MemoryTxn<'a> {
    base: &'a MemoryLedgerInner,
    /// `None` marks a deleted record.
    records: BTreeMap<Address, Option<Vec<u8>>>,
    balances: BTreeMap<Address, Lamports>,
}

struct Overlay {
    records: BTreeMap<Address, Option<Vec<u8>>>,
    balances: BTreeMap<Address, Lamports>,
}

impl<'a> MemoryTxn<'a> {
    fn new(base: &'a MemoryLedgerInner) -> Self {
        Self {
            base,
            records: BTreeMap::new(),
            balances: BTreeMap::new(),
        }
    }

    fn into_overlay(self) -> Overlay {
        Overlay {
            records: self.records,
            balances: self.balances,
        }
    }
}

impl MemoryLedgerInner {
    fn apply(&mut self, overlay: Overlay) {
        for (address, data) in overlay.records {
            match data {
                Some(bytes) => {
                    self.records.insert(address, bytes);
                }
                None => {
                    self.records.remove(&address);
                }
            }
        }
        for (address, lamports) in overlay.balances {
            if lamports == 0 {
                self.balances.remove(&address);
            } else {
                self.balances.insert(address, lamports);
            }
        }
    }
}

impl LedgerTxn for MemoryTxn<'_> {
    fn get_record(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        match self.records.get(address) {
            Some(pending) => Ok(pending.clone()),
            None => Ok(self.base.records.get(address).cloned()),
        }
    }

    fn put_record(&mut self, address: &Address, data: Vec<u8>) -> Result<()> {
        self.records.insert(*address, Some(data));
        Ok(())
    }

    fn delete_record(&mut self, address: &Address) -> Result<bool> {
        let existed = self.get_record(address)?.is_some();
        self.records.insert(*address, None);
        Ok(existed)
    }

    fn records_by_kind(&self, kind: RecordKind) -> Result<Vec<(Address, Vec<u8>)>> {
        let mut merged: BTreeMap<Address, Vec<u8>> = self.base.records.clone();
        for (address, pending) in &self.records {
            match pending {
                Some(bytes) => {
                    merged.insert(*address, bytes.clone());
                }
                None => {
                    merged.remove(address);
                }
            }
        }
        Ok(merged
            .into_iter()
            .filter(|(_, bytes)| RecordKind::from_discriminator(bytes) == Some(kind))
            .collect())
    }

    fn balance(&self, address: &Address) -> Result<Lamports> {
        match self.balances.get(address) {
            Some(lamports) => Ok(*lamports),
            None => Ok(self.base.balances.get(address).copied().unwrap_or(0)),
        }
    }

    fn set_balance(&mut self, address: &Address, lamports: Lamports) -> Result<()> {
        if lamports > MAX_BALANCE {
            return Err(StoreError::InvalidData(format!(
                "balance {} exceeds storage range",
                lamports
            )));
        }
        self.balances.insert(*address, lamports);
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn transact<T, F>(&self, f: F) -> std::result::Result<T, ProgramError>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> std::result::Result<T, ProgramError>,
    {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let (result, overlay) = {
            let mut txn = MemoryTxn::new(&inner);
            let result = f(&mut txn);
            (result, txn.into_overlay())
        };

        if result.is_ok() {
            inner.apply(overlay);
        }
        result
    }

    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerTxn) -> Result<T>,
    {
        let inner = self
            .inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let txn = MemoryTxn::new(&inner);
        f(&txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LedgerTxnExt;
    use streak_vault_core::{ProtocolError, Record};

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 32])
    }

    fn tagged(kind: RecordKind, body: &[u8]) -> Vec<u8> {
        let mut bytes = kind.discriminator().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_commit_on_ok() {
        let ledger = MemoryLedger::new();
        ledger.fund(&addr(1), 100).unwrap();

        ledger
            .transact(|txn| {
                txn.transfer(&addr(1), &addr(2), 40)?;
                txn.put_record(&addr(3), vec![1, 2, 3])?;
                Ok(())
            })
            .unwrap();

        assert_eq!(ledger.balance(&addr(1)).unwrap(), 60);
        assert_eq!(ledger.balance(&addr(2)).unwrap(), 40);
        assert_eq!(ledger.get_record(&addr(3)).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_rollback_on_err() {
        let ledger = MemoryLedger::new();
        ledger.fund(&addr(1), 100).unwrap();

        let result: std::result::Result<(), ProgramError> = ledger.transact(|txn| {
            txn.transfer(&addr(1), &addr(2), 40)?;
            txn.put_record(&addr(3), vec![9])?;
            Err(ProtocolError::NotFound.into())
        });

        assert!(result.is_err());
        assert_eq!(ledger.balance(&addr(1)).unwrap(), 100);
        assert_eq!(ledger.balance(&addr(2)).unwrap(), 0);
        assert_eq!(ledger.get_record(&addr(3)).unwrap(), None);
    }

    #[test]
    fn test_reads_see_own_writes() {
        let ledger = MemoryLedger::new();
        ledger
            .transact(|txn| {
                txn.put_record(&addr(1), vec![7])?;
                assert_eq!(txn.get_record(&addr(1))?, Some(vec![7]));
                assert!(txn.delete_record(&addr(1))?);
                assert_eq!(txn.get_record(&addr(1))?, None);
                assert!(!txn.delete_record(&addr(1))?);
                Ok(())
            })
            .unwrap();
        assert_eq!(ledger.get_record(&addr(1)).unwrap(), None);
    }

    #[test]
    fn test_insufficient_funds() {
        let ledger = MemoryLedger::new();
        ledger.fund(&addr(1), 10).unwrap();

        let err = ledger
            .transact(|txn| txn.transfer(&addr(1), &addr(2), 11))
            .unwrap_err();
        assert_eq!(
            err.protocol(),
            Some(&ProtocolError::InsufficientFunds {
                required: 11,
                available: 10
            })
        );
    }

    #[test]
    fn test_credit_overflow() {
        let ledger = MemoryLedger::new();
        ledger.fund(&addr(1), MAX_BALANCE).unwrap();
        let err = ledger.fund(&addr(1), 1).unwrap_err();
        assert_eq!(err.protocol(), Some(&ProtocolError::Overflow));
        assert_eq!(ledger.balance(&addr(1)).unwrap(), MAX_BALANCE);

        let err = ledger.fund(&addr(2), u64::MAX).unwrap_err();
        assert_eq!(err.protocol(), Some(&ProtocolError::Overflow));
        assert_eq!(ledger.balance(&addr(2)).unwrap(), 0);
    }

    #[test]
    fn test_balance_above_ceiling_rejected() {
        let ledger = MemoryLedger::new();
        let result = ledger.transact(|txn| {
            txn.set_balance(&addr(1), MAX_BALANCE + 1)
                .map_err(Into::into)
        });
        assert!(matches!(
            result,
            Err(ProgramError::Store(StoreError::InvalidData(_)))
        ));
        assert_eq!(ledger.balance(&addr(1)).unwrap(), 0);
    }

    #[test]
    fn test_records_by_kind_filters_and_merges() {
        let ledger = MemoryLedger::new();
        ledger
            .transact(|txn| {
                txn.put_record(&addr(1), tagged(RecordKind::VaultEntry, b"a"))?;
                txn.put_record(&addr(2), tagged(RecordKind::CapabilityToken, b"b"))?;
                txn.put_record(&addr(3), tagged(RecordKind::VaultEntry, b"c"))?;
                Ok(())
            })
            .unwrap();

        ledger
            .transact(|txn| {
                txn.delete_record(&addr(1))?;
                txn.put_record(&addr(4), tagged(RecordKind::VaultEntry, b"d"))?;
                let vaults = txn.records_by_kind(RecordKind::VaultEntry)?;
                let addresses: Vec<Address> = vaults.into_iter().map(|(a, _)| a).collect();
                assert_eq!(addresses, vec![addr(3), addr(4)]);
                Ok(())
            })
            .unwrap();

        let tokens = ledger.records_by_kind(RecordKind::CapabilityToken).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, addr(2));
    }

    #[test]
    fn test_close_account() {
        let ledger = MemoryLedger::new();
        ledger.fund(&addr(5), 70).unwrap();
        ledger
            .transact(|txn| txn.put_record(&addr(5), vec![1]).map_err(Into::into))
            .unwrap();

        let moved = ledger
            .transact(|txn| txn.close_account(&addr(5), &addr(6)))
            .unwrap();

        assert_eq!(moved, 70);
        assert_eq!(ledger.balance(&addr(5)).unwrap(), 0);
        assert_eq!(ledger.balance(&addr(6)).unwrap(), 70);
        assert_eq!(ledger.get_record(&addr(5)).unwrap(), None);
    }

    #[test]
    fn test_typed_load_and_save() {
        use streak_vault_core::{DeckId, Keypair, VaultEntry};

        let owner = Keypair::from_seed(&[4; 32]).identity();
        let entry = VaultEntry::new(owner, DeckId::new("verbs").unwrap(), 500, 2, 1_000);
        let address = entry.address();

        let ledger = MemoryLedger::new();
        ledger
            .transact(|txn| txn.save(&entry).map_err(Into::into))
            .unwrap();

        let loaded: Option<VaultEntry> = ledger.load(&address).unwrap();
        assert_eq!(loaded, Some(entry.clone()));

        let all = ledger
            .view(|txn| txn.load_all::<VaultEntry>())
            .unwrap();
        assert_eq!(all, vec![entry]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn transfers_conserve_supply(
                transfers in prop::collection::vec((0u8..4, 0u8..4, 0u64..400), 0..32),
            ) {
                let ledger = MemoryLedger::new();
                for b in 0..4u8 {
                    ledger.fund(&addr(b), 250).unwrap();
                }

                for (from, to, amount) in transfers {
                    let before = ledger.balance(&addr(from)).unwrap();
                    let result = ledger.transact(|txn| txn.transfer(&addr(from), &addr(to), amount));
                    if amount > before {
                        prop_assert!(result.is_err());
                        prop_assert_eq!(ledger.balance(&addr(from)).unwrap(), before);
                    }
                }

                let total: u64 = (0..4u8).map(|b| ledger.balance(&addr(b)).unwrap()).sum();
                prop_assert_eq!(total, 1_000);
            }
        }
    }
}
