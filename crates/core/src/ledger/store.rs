//! Storage seam for the ledger engine.
//!
//! Reads go straight to the store. Every write goes through a
//! [`LedgerUnit`] opened with [`LedgerStore::begin`], which either commits all
//! of its changes or none of them. Balance deltas exist only on the unit.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, PageRequest, PageResponse, TransactionId};
use uuid::Uuid;

use super::account::Account;
use super::entry::{Direction, TransactionEntry};
use super::error::LedgerError;
use super::transaction::{Transaction, TransactionFilter, TransactionStatus};
use super::types::ReferenceKind;

/// Persistent store consumed by the ledger engine.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomic unit of work handed out by [`LedgerStore::begin`].
    type Unit: LedgerUnit;

    /// Opens a unit of work.
    async fn begin(&self) -> Result<Self::Unit, LedgerError>;

    /// Looks up an account.
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Returns true if a project, category or counterparty exists.
    async fn reference_exists(&self, kind: ReferenceKind, id: Uuid) -> Result<bool, LedgerError>;

    /// Looks up a transaction.
    async fn find_transaction(&self, id: TransactionId)
    -> Result<Option<Transaction>, LedgerError>;

    /// Returns the entries of a transaction, in insertion order.
    async fn find_entries(&self, id: TransactionId) -> Result<Vec<TransactionEntry>, LedgerError>;

    /// Returns every entry against an account whose transaction is completed.
    async fn find_completed_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionEntry>, LedgerError>;

    /// Returns one page of the transactions matching `filter`, newest
    /// business date first. Ties fall back to creation time, then id, both
    /// descending.
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError>;
}

/// One atomic unit of work.
///
/// Dropping a unit without committing discards its changes.
#[async_trait]
pub trait LedgerUnit: Send {
    /// Stages a new transaction row.
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), LedgerError>;

    /// Stages entry rows for a transaction staged or stored earlier.
    async fn insert_entries(&mut self, entries: &[TransactionEntry]) -> Result<(), LedgerError>;

    /// Applies one entry's delta to an account and returns the account as it
    /// now stands inside this unit. Debits increase the balance.
    ///
    /// # Errors
    ///
    /// `NotFound` when the account does not exist, `AccountInactive` when it
    /// has been deactivated, `AmountOverflow` when the balance would not be
    /// representable.
    async fn apply_delta(
        &mut self,
        account_id: AccountId,
        direction: Direction,
        amount: Decimal,
    ) -> Result<Account, LedgerError>;

    /// Moves a transaction from `from` to `to`.
    ///
    /// # Errors
    ///
    /// `StorageConflict` if the stored status is no longer `from`.
    async fn transition(
        &mut self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<(), LedgerError>;

    /// Removes a draft transaction together with its entries.
    ///
    /// # Errors
    ///
    /// `StorageConflict` if the transaction is no longer a draft.
    async fn delete_draft(&mut self, id: TransactionId) -> Result<(), LedgerError>;

    /// Makes every staged change visible at once.
    async fn commit(self) -> Result<(), LedgerError>;

    /// Discards every staged change.
    async fn rollback(self) -> Result<(), LedgerError>;
}
