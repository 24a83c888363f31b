//! Ledger traits: the abstract interface to addressed records and balances.
//!
//! A [`Ledger`] hands out [`LedgerTxn`] views inside [`Ledger::transact`].
//! Every change made through the view commits when the closure returns `Ok`
//! and is discarded when it returns `Err`.

use streak_vault_core::{Address, Lamports, ProtocolError, Record, RecordKind};

use crate::error::{ProgramError, Result};

/// Largest balance any address may hold. SQLite stores balances as signed
/// 64-bit integers, so every backend applies the same ceiling.
pub const MAX_BALANCE: Lamports = i64::MAX as Lamports;

fn add_balance(balance: Lamports, amount: Lamports) -> std::result::Result<Lamports, ProtocolError> {
    balance
        .checked_add(amount)
        .filter(|sum| *sum <= MAX_BALANCE)
        .ok_or(ProtocolError::Overflow)
}

/// An atomic view over ledger records and balances.
///
/// Reads observe the writes made earlier in the same transaction.
pub trait LedgerTxn {
    // ─────────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Raw bytes stored at an address.
    fn get_record(&self, address: &Address) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite the record at an address.
    fn put_record(&mut self, address: &Address, data: Vec<u8>) -> Result<()>;

    /// Remove the record at an address. Returns whether one existed.
    fn delete_record(&mut self, address: &Address) -> Result<bool>;

    /// Every record whose leading bytes are the discriminator of `kind`,
    /// ordered by address.
    fn records_by_kind(&self, kind: RecordKind) -> Result<Vec<(Address, Vec<u8>)>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Balances
    // ─────────────────────────────────────────────────────────────────────────

    /// Lamports held at an address. Unknown addresses hold zero.
    fn balance(&self, address: &Address) -> Result<Lamports>;

    /// Overwrite the lamports held at an address.
    fn set_balance(&mut self, address: &Address, lamports: Lamports) -> Result<()>;
}

/// Typed helpers over any [`LedgerTxn`].
pub trait LedgerTxnExt: LedgerTxn {
    /// Load and decode a record.
    fn load<R: Record>(&self, address: &Address) -> Result<Option<R>> {
        match self.get_record(address)? {
            Some(bytes) => Ok(Some(R::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Encode a record and write it at its own address.
    fn save<R: Record>(&mut self, record: &R) -> Result<()> {
        let bytes = record.encode()?;
        self.put_record(&record.address(), bytes)
    }

    fn exists(&self, address: &Address) -> Result<bool> {
        Ok(self.get_record(address)?.is_some())
    }

    /// Decode every record of type `R`.
    fn load_all<R: Record>(&self) -> Result<Vec<R>> {
        self.records_by_kind(R::KIND)?
            .into_iter()
            .map(|(_, bytes)| R::decode(&bytes).map_err(Into::into))
            .collect()
    }

    /// Move lamports between addresses.
    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Lamports,
    ) -> std::result::Result<(), ProgramError> {
        let available = self.balance(from)?;
        if available < amount {
            return Err(ProtocolError::InsufficientFunds {
                required: amount,
                available,
            }
            .into());
        }
        if from == to {
            return Ok(());
        }
        let credited = add_balance(self.balance(to)?, amount)?;
        self.set_balance(from, available - amount)?;
        self.set_balance(to, credited)?;
        Ok(())
    }

    /// Add newly minted lamports to an address.
    fn credit(
        &mut self,
        address: &Address,
        amount: Lamports,
    ) -> std::result::Result<(), ProgramError> {
        let credited = add_balance(self.balance(address)?, amount)?;
        self.set_balance(address, credited)?;
        Ok(())
    }

    /// Close an account: delete its record and move its whole balance to
    /// `recipient`. Returns the lamports moved.
    fn close_account(
        &mut self,
        address: &Address,
        recipient: &Address,
    ) -> std::result::Result<Lamports, ProgramError> {
        let lamports = self.balance(address)?;
        self.transfer(address, recipient, lamports)?;
        self.delete_record(address)?;
        Ok(lamports)
    }
}

impl<T: LedgerTxn + ?Sized> LedgerTxnExt for T {}

/// A ledger that runs closures as atomic transactions.
///
/// Implementations serialize transactions: one transaction observes the
/// committed effects of every earlier one and none of a later one.
pub trait Ledger: Send + Sync + 'static {
    /// Run `f` atomically. Its writes commit if and only if it returns `Ok`.
    fn transact<T, F>(&self, f: F) -> std::result::Result<T, ProgramError>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> std::result::Result<T, ProgramError>;

    /// Run a read-only closure against committed state.
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerTxn) -> Result<T>;

    // ─────────────────────────────────────────────────────────────────────────
    // Convenience reads
    // ─────────────────────────────────────────────────────────────────────────

    fn balance(&self, address: &Address) -> Result<Lamports> {
        self.view(|txn| txn.balance(address))
    }

    fn get_record(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        self.view(|txn| txn.get_record(address))
    }

    fn records_by_kind(&self, kind: RecordKind) -> Result<Vec<(Address, Vec<u8>)>> {
        self.view(|txn| txn.records_by_kind(kind))
    }

    /// Load and decode one committed record.
    fn load<R: Record>(&self, address: &Address) -> Result<Option<R>> {
        self.view(|txn| txn.load(address))
    }

    /// Airdrop lamports to an address.
    fn fund(&self, address: &Address, amount: Lamports) -> std::result::Result<(), ProgramError> {
        self.transact(|txn| txn.credit(address, amount))
    }
}
