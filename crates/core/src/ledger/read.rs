//! Read model: transactions with their entries, and balance audits.
//!
//! Pure reads. Nothing here enforces or repairs invariants.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::types::{AccountId, PageRequest, PageResponse, TransactionId};

use super::account::{Account, AccountKind};
use super::entry::TransactionEntry;
use super::error::LedgerError;
use super::store::LedgerStore;
use super::transaction::{Transaction, TransactionFilter};

/// An entry joined to the account it moves, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    /// The entry itself.
    pub entry: TransactionEntry,
    /// Display name of the account.
    pub account_name: String,
    /// Kind of the account.
    pub account_kind: AccountKind,
}

/// A transaction together with its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionWithEntries {
    /// The transaction.
    pub transaction: Transaction,
    /// Its entries joined to account names.
    pub entries: Vec<EntryView>,
}

/// Comparison of a stored balance against its completed entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceAudit {
    /// Audited account.
    pub account_id: AccountId,
    /// Balance as stored on the account.
    pub recorded: Decimal,
    /// Signed sum of entries of completed transactions.
    pub derived: Decimal,
}

impl BalanceAudit {
    /// True when the stored balance matches the entries.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.recorded == self.derived
    }
}

/// Query side of the ledger.
pub struct LedgerReader<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> LedgerReader<S> {
    /// Creates a reader over a store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Loads a transaction with its entries and their account names.
    pub async fn get_with_entries(
        &self,
        id: TransactionId,
    ) -> Result<TransactionWithEntries, LedgerError> {
        let transaction = self
            .store
            .find_transaction(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        let entries = self.store.find_entries(id).await?;

        let mut accounts: HashMap<AccountId, Account> = HashMap::new();
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            if !accounts.contains_key(&entry.account_id) {
                let account = self.account_balance(entry.account_id).await?;
                accounts.insert(account.id, account);
            }
            let account = &accounts[&entry.account_id];
            views.push(EntryView {
                account_name: account.name.clone(),
                account_kind: account.kind,
                entry,
            });
        }

        Ok(TransactionWithEntries {
            transaction,
            entries: views,
        })
    }

    /// Lists transactions matching `filter`, newest business date first.
    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        self.store.list_transactions(filter, page).await
    }

    /// Loads an account with its current balance.
    pub async fn account_balance(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .find_account(id)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    /// Entries of completed transactions against an account.
    pub async fn entries_for_account(
        &self,
        id: AccountId,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.store.find_completed_entries(id).await
    }

    /// Recomputes an account's balance from its completed entries.
    pub async fn audit_balance(&self, id: AccountId) -> Result<BalanceAudit, LedgerError> {
        let account = self.account_balance(id).await?;
        let derived = self
            .entries_for_account(id)
            .await?
            .iter()
            .map(TransactionEntry::signed_amount)
            .try_fold(Decimal::ZERO, Decimal::checked_add)
            .ok_or(LedgerError::AmountOverflow)?;

        Ok(BalanceAudit {
            account_id: id,
            recorded: account.balance,
            derived,
        })
    }
}
