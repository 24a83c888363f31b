//! SQLite implementation of the Ledger trait.
//!
//! This is the persistent backend. Each ledger transaction is a native SQLite
//! transaction: committed when the closure succeeds, rolled back otherwise.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use streak_vault_core::canonical::DISCRIMINATOR_LEN;
use streak_vault_core::{Address, Lamports, RecordKind};

use crate::error::{ProgramError, Result, StoreError};
use crate::migration;
use crate::traits::{Ledger, LedgerTxn};

/// SQLite-based ledger implementation.
///
/// Thread-safe via internal Mutex; the mutex also serializes transactions.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                Some(format!("mutex poisoned: {}", e)),
            ))
        })
    }
}

/// A view bound to one open SQLite transaction (or a plain connection for
/// read-only views).
struct SqliteTxn<'a> {
    conn: &'a Connection,
}

fn blob_to_address(bytes: Vec<u8>) -> Result<Address> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData("address is not 32 bytes".into()))?;
    Ok(Address::from_bytes(arr))
}

fn lamports_to_sql(lamports: Lamports) -> Result<i64> {
    i64::try_from(lamports)
        .map_err(|_| StoreError::InvalidData(format!("balance {} exceeds storage range", lamports)))
}

impl LedgerTxn for SqliteTxn<'_> {
    fn get_record(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE address = ?1",
                params![address.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    fn put_record(&mut self, address: &Address, data: Vec<u8>) -> Result<()> {
        let kind = data
            .get(..DISCRIMINATOR_LEN)
            .ok_or_else(|| StoreError::InvalidData("record shorter than discriminator".into()))?
            .to_vec();
        self.conn.execute(
            "INSERT INTO records (address, kind, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(address) DO UPDATE SET kind = excluded.kind, data = excluded.data",
            params![address.as_bytes().as_slice(), kind, data],
        )?;
        Ok(())
    }

    fn delete_record(&mut self, address: &Address) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM records WHERE address = ?1",
            params![address.as_bytes().as_slice()],
        )?;
        Ok(removed > 0)
    }

    fn records_by_kind(&self, kind: RecordKind) -> Result<Vec<(Address, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT address, data FROM records WHERE kind = ?1 ORDER BY address")?;
        let rows = stmt
            .query_map(params![kind.discriminator().as_slice()], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(address, data)| Ok((blob_to_address(address)?, data)))
            .collect()
    }

    fn balance(&self, address: &Address) -> Result<Lamports> {
        let lamports: Option<i64> = self
            .conn
            .query_row(
                "SELECT lamports FROM balances WHERE address = ?1",
                params![address.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;

        match lamports {
            None => Ok(0),
            Some(n) => Lamports::try_from(n)
                .map_err(|_| StoreError::InvalidData(format!("negative balance {}", n))),
        }
    }

    fn set_balance(&mut self, address: &Address, lamports: Lamports) -> Result<()> {
        if lamports == 0 {
            self.conn.execute(
                "DELETE FROM balances WHERE address = ?1",
                params![address.as_bytes().as_slice()],
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO balances (address, lamports) VALUES (?1, ?2)
                 ON CONFLICT(address) DO UPDATE SET lamports = excluded.lamports",
                params![address.as_bytes().as_slice(), lamports_to_sql(lamports)?],
            )?;
        }
        Ok(())
    }
}

impl Ledger for SqliteLedger {
    fn transact<T, F>(&self, f: F) -> std::result::Result<T, ProgramError>
    where
        F: FnOnce(&mut dyn LedgerTxn) -> std::result::Result<T, ProgramError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let result = {
            let mut txn = SqliteTxn { conn: &tx };
            f(&mut txn)
        };

        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }

    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerTxn) -> Result<T>,
    {
        let conn = self.lock()?;
        let txn = SqliteTxn { conn: &conn };
        f(&txn)
    }
}
