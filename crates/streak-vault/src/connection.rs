//! The client's view of a host.
//!
//! Scenario code talks to a [`Connection`] rather than to a [`Host`]
//! directly, so the same flows can run against any backend that can accept
//! signed transactions and answer reads.

use async_trait::async_trait;

use streak_vault_core::{Address, Lamports, RecordKind, Timestamp, Transaction};
use streak_vault_store::Ledger;

use crate::error::{HostError, Result};
use crate::host::{Host, Outcome};

/// Async client interface to a ledger host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Submit a signed transaction and wait for it to commit or fail.
    async fn send_transaction(&self, tx: Transaction) -> Result<Vec<Outcome>>;

    /// Lamports held at an address.
    async fn get_balance(&self, address: &Address) -> Result<Lamports>;

    /// Raw record bytes at an address.
    async fn get_record(&self, address: &Address) -> Result<Option<Vec<u8>>>;

    /// Every record of one kind, by address.
    async fn get_records_by_kind(&self, kind: RecordKind) -> Result<Vec<(Address, Vec<u8>)>>;

    /// Host time, for stamping new transactions.
    async fn now(&self) -> Result<Timestamp>;
}

impl<L: Ledger> Host<L> {
    /// Run a read against the ledger on the blocking thread pool.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&L) -> streak_vault_store::Result<T> + Send + 'static,
    {
        let host = self.clone();
        tokio::task::spawn_blocking(move || f(host.ledger()).map_err(HostError::from))
            .await
            .map_err(|e| HostError::Join(e.to_string()))?
    }
}

#[async_trait]
impl<L: Ledger> Connection for Host<L> {
    async fn send_transaction(&self, tx: Transaction) -> Result<Vec<Outcome>> {
        self.submit(tx).await
    }

    async fn get_balance(&self, address: &Address) -> Result<Lamports> {
        let address = *address;
        self.read(move |ledger| ledger.balance(&address)).await
    }

    async fn get_record(&self, address: &Address) -> Result<Option<Vec<u8>>> {
        let address = *address;
        self.read(move |ledger| ledger.get_record(&address)).await
    }

    async fn get_records_by_kind(&self, kind: RecordKind) -> Result<Vec<(Address, Vec<u8>)>> {
        self.read(move |ledger| ledger.records_by_kind(kind)).await
    }

    async fn now(&self) -> Result<Timestamp> {
        Ok(Host::now(self))
    }
}
