//! In-memory ledger store with optimistic concurrency.
//!
//! A unit of work reads accounts lazily, remembers the version it saw, and
//! stages every change locally. `commit` takes the store lock once,
//! re-checks every recorded version and status precondition, and then
//! applies everything or nothing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, PageRequest, PageResponse, TransactionId};
use uuid::Uuid;

use super::account::{Account, NewAccount};
use super::entry::{Direction, TransactionEntry};
use super::error::LedgerError;
use super::store::{LedgerStore, LedgerUnit};
use super::transaction::{Transaction, TransactionFilter, TransactionStatus};
use super::types::ReferenceKind;
use crate::conversion::detail::{CryptoDetailStore, CryptoTransactionDetail};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    entries: Vec<TransactionEntry>,
    references: HashSet<(ReferenceKind, Uuid)>,
    crypto_details: HashMap<TransactionId, CryptoTransactionDetail>,
}

/// Ledger store kept entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>, LedgerError> {
    state
        .lock()
        .map_err(|_| LedgerError::Storage("memory store lock poisoned".to_string()))
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an account.
    pub fn create_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let account = Account::open(new);
        lock(&self.state)?
            .accounts
            .insert(account.id, account.clone());
        Ok(account)
    }

    /// Marks an account inactive. Its balance and entries stay.
    pub fn deactivate_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let mut state = lock(&self.state)?;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        account.is_active = false;
        Ok(account.clone())
    }

    /// Registers a project, category or counterparty id.
    pub fn register_reference(&self, kind: ReferenceKind, id: Uuid) -> Result<(), LedgerError> {
        lock(&self.state)?.references.insert((kind, id));
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<Self::Unit, LedgerError> {
        Ok(MemoryUnit {
            state: Arc::clone(&self.state),
            read_versions: BTreeMap::new(),
            accounts: BTreeMap::new(),
            transactions: Vec::new(),
            entries: Vec::new(),
            transitions: Vec::new(),
            deletions: Vec::new(),
        })
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        Ok(lock(&self.state)?.accounts.get(&id).cloned())
    }

    async fn reference_exists(&self, kind: ReferenceKind, id: Uuid) -> Result<bool, LedgerError> {
        Ok(lock(&self.state)?.references.contains(&(kind, id)))
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        Ok(lock(&self.state)?.transactions.get(&id).cloned())
    }

    async fn find_entries(&self, id: TransactionId) -> Result<Vec<TransactionEntry>, LedgerError> {
        Ok(lock(&self.state)?
            .entries
            .iter()
            .filter(|entry| entry.transaction_id == id)
            .cloned()
            .collect())
    }

    async fn find_completed_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        let state = lock(&self.state)?;
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .filter(|entry| {
                state
                    .transactions
                    .get(&entry.transaction_id)
                    .is_some_and(Transaction::affects_balances)
            })
            .cloned()
            .collect())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        let mut matching: Vec<Transaction> = lock(&self.state)?
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (b.transaction_date, b.created_at, b.id).cmp(&(a.transaction_date, a.created_at, a.id))
        });

        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let data = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .collect();
        Ok(PageResponse::new(data, page, total))
    }
}

#[async_trait]
impl CryptoDetailStore for MemoryLedgerStore {
    async fn save_crypto_detail(&self, detail: &CryptoTransactionDetail) -> Result<(), LedgerError> {
        let mut state = lock(&self.state)?;
        if !state.transactions.contains_key(&detail.transaction_id) {
            return Err(LedgerError::TransactionNotFound(detail.transaction_id));
        }
        state
            .crypto_details
            .insert(detail.transaction_id, detail.clone());
        Ok(())
    }

    async fn find_crypto_detail(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<CryptoTransactionDetail>, LedgerError> {
        Ok(lock(&self.state)?.crypto_details.get(&transaction_id).cloned())
    }
}

/// Staged changes of one in-memory unit of work.
#[derive(Debug)]
pub struct MemoryUnit {
    state: Arc<Mutex<MemoryState>>,
    read_versions: BTreeMap<AccountId, i64>,
    accounts: BTreeMap<AccountId, Account>,
    transactions: Vec<Transaction>,
    entries: Vec<TransactionEntry>,
    transitions: Vec<(TransactionId, TransactionStatus, TransactionStatus)>,
    deletions: Vec<TransactionId>,
}

impl MemoryUnit {
    fn check_preconditions(&self, state: &MemoryState) -> Result<(), LedgerError> {
        for (id, seen) in &self.read_versions {
            let current = state.accounts.get(id);
            if current.is_some_and(|account| !account.is_active) {
                return Err(LedgerError::AccountInactive(*id));
            }
            if current.map(|account| account.version) != Some(*seen) {
                return Err(LedgerError::StorageConflict(format!(
                    "account {id} changed since it was read"
                )));
            }
        }

        for (id, from, _) in &self.transitions {
            let current = state.transactions.get(id).map(|tx| tx.status);
            if current != Some(*from) {
                return Err(LedgerError::StorageConflict(format!(
                    "transaction {id} is no longer {from}"
                )));
            }
        }

        for id in &self.deletions {
            let current = state.transactions.get(id).map(|tx| tx.status);
            if current != Some(TransactionStatus::Draft) {
                return Err(LedgerError::StorageConflict(format!(
                    "transaction {id} is no longer a draft"
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl LedgerUnit for MemoryUnit {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.transactions.push(transaction.clone());
        Ok(())
    }

    async fn insert_entries(&mut self, entries: &[TransactionEntry]) -> Result<(), LedgerError> {
        self.entries.extend_from_slice(entries);
        Ok(())
    }

    async fn apply_delta(
        &mut self,
        account_id: AccountId,
        direction: Direction,
        amount: Decimal,
    ) -> Result<Account, LedgerError> {
        if !self.accounts.contains_key(&account_id) {
            let account = lock(&self.state)?
                .accounts
                .get(&account_id)
                .cloned()
                .ok_or_else(|| LedgerError::account_not_found(account_id))?;
            if !account.is_active {
                return Err(LedgerError::AccountInactive(account_id));
            }
            self.read_versions.insert(account_id, account.version);
            self.accounts.insert(account_id, account);
        }

        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        account.apply(direction, amount)?;
        Ok(account.clone())
    }

    async fn transition(
        &mut self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<(), LedgerError> {
        if let Some(staged) = self.transactions.iter_mut().find(|tx| tx.id == id) {
            if staged.status != from {
                return Err(LedgerError::StorageConflict(format!(
                    "transaction {id} is no longer {from}"
                )));
            }
            staged.status = to;
            return Ok(());
        }
        self.transitions.push((id, from, to));
        Ok(())
    }

    async fn delete_draft(&mut self, id: TransactionId) -> Result<(), LedgerError> {
        self.deletions.push(id);
        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        let mut state = lock(&self.state)?;
        self.check_preconditions(&state)?;

        let now = Utc::now();
        // Only the balance columns are staged; other fields stay as stored.
        for (id, staged) in self.accounts {
            if let Some(account) = state.accounts.get_mut(&id) {
                account.balance = staged.balance;
                account.version = staged.version;
            }
        }
        for transaction in self.transactions {
            state.transactions.insert(transaction.id, transaction);
        }
        state.entries.extend(self.entries);
        for (id, _, to) in self.transitions {
            if let Some(transaction) = state.transactions.get_mut(&id) {
                transaction.status = to;
                transaction.updated_at = now;
            }
        }
        for id in self.deletions {
            state.transactions.remove(&id);
            state.entries.retain(|entry| entry.transaction_id != id);
            state.crypto_details.remove(&id);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        Ok(())
    }
}
