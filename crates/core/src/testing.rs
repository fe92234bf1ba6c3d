//! Test doubles shared by the engine and conversion tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, CurrencyCode, PageRequest, PageResponse, TransactionId};
use uuid::Uuid;

use crate::conversion::{
    CryptoDetailStore, CryptoTransactionDetail, ExternalTransfer, RateError, RateSource,
    ReferenceError, ReferenceValidator,
};
use crate::ledger::{
    Account, AccountKind, Direction, LedgerError, LedgerStore, LedgerUnit, MemoryLedgerStore,
    MemoryUnit, NewAccount, ReferenceKind, Transaction, TransactionEntry, TransactionFilter,
    TransactionStatus,
};

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 26).unwrap()
}

pub fn open_account(store: &MemoryLedgerStore, name: &str, kind: AccountKind) -> AccountId {
    let currency = CurrencyCode::parse(if kind == AccountKind::Crypto { "TRX" } else { "USD" })
        .unwrap();
    store
        .create_account(NewAccount::new(name, kind, currency))
        .unwrap()
        .id
}

pub async fn balance<S: LedgerStore>(store: &S, id: AccountId) -> Decimal {
    store.find_account(id).await.unwrap().unwrap().balance
}

/// Rate source answering from a fixed table; unknown codes fail.
#[derive(Default)]
pub struct FakeRates {
    quotes: HashMap<String, Decimal>,
    hang: bool,
}

impl FakeRates {
    pub fn with(code: &str, rate: Decimal) -> Self {
        Self::default().and(code, rate)
    }

    pub fn and(mut self, code: &str, rate: Decimal) -> Self {
        self.quotes.insert(code.to_string(), rate);
        self
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn hanging() -> Self {
        Self {
            quotes: HashMap::new(),
            hang: true,
        }
    }
}

#[async_trait]
impl RateSource for FakeRates {
    async fn rate(&self, currency: &CurrencyCode) -> Result<Decimal, RateError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.quotes
            .get(currency.as_str())
            .copied()
            .ok_or_else(|| RateError::MissingQuote(currency.to_string()))
    }
}

/// Explorer answering from a fixed table.
#[derive(Default)]
pub struct FakeExplorer {
    transfers: HashMap<String, ExternalTransfer>,
    failing: bool,
    hang: bool,
}

impl FakeExplorer {
    pub fn with(reference: &str, transfer: ExternalTransfer) -> Self {
        let mut explorer = Self::default();
        explorer.transfers.insert(reference.to_string(), transfer);
        explorer
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }
}

pub fn transfer(confirmed: bool) -> ExternalTransfer {
    ExternalTransfer {
        confirmed,
        block_number: Some(68_123_456),
        fee: Some(Decimal::new(11, 1)),
        from_address: Some("TJRabPrwbZy45sbavfcjinPJC18kjpRTv8".to_string()),
        to_address: Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string()),
        timestamp: None,
    }
}

#[async_trait]
impl ReferenceValidator for FakeExplorer {
    async fn lookup(&self, reference: &str) -> Result<Option<ExternalTransfer>, ReferenceError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing {
            return Err(ReferenceError::Request("connection refused".to_string()));
        }
        Ok(self.transfers.get(reference).cloned())
    }
}

/// Memory store with injectable failures.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryLedgerStore,
    conflicts: Arc<AtomicU32>,
    fail_delta_for: Option<AccountId>,
    fail_details: bool,
}

impl FlakyStore {
    pub fn new(inner: MemoryLedgerStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// The next `count` commits report a conflict and discard their changes.
    pub fn with_conflicts(self, count: u32) -> Self {
        self.conflicts.store(count, Ordering::SeqCst);
        self
    }

    /// Balance deltas against this account fail with a storage error.
    pub fn failing_delta_for(mut self, account_id: AccountId) -> Self {
        self.fail_delta_for = Some(account_id);
        self
    }

    pub fn failing_details(mut self) -> Self {
        self.fail_details = true;
        self
    }

    pub fn remaining_conflicts(&self) -> u32 {
        self.conflicts.load(Ordering::SeqCst)
    }
}

pub struct FlakyUnit {
    inner: MemoryUnit,
    conflicts: Arc<AtomicU32>,
    fail_delta_for: Option<AccountId>,
}

#[async_trait]
impl LedgerStore for FlakyStore {
    type Unit = FlakyUnit;

    async fn begin(&self) -> Result<Self::Unit, LedgerError> {
        Ok(FlakyUnit {
            inner: self.inner.begin().await?,
            conflicts: Arc::clone(&self.conflicts),
            fail_delta_for: self.fail_delta_for,
        })
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        self.inner.find_account(id).await
    }

    async fn reference_exists(&self, kind: ReferenceKind, id: Uuid) -> Result<bool, LedgerError> {
        self.inner.reference_exists(kind, id).await
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        self.inner.find_transaction(id).await
    }

    async fn find_entries(&self, id: TransactionId) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.inner.find_entries(id).await
    }

    async fn find_completed_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        self.inner.find_completed_entries(account_id).await
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        self.inner.list_transactions(filter, page).await
    }
}

#[async_trait]
impl CryptoDetailStore for FlakyStore {
    async fn save_crypto_detail(&self, detail: &CryptoTransactionDetail) -> Result<(), LedgerError> {
        if self.fail_details {
            return Err(LedgerError::Storage("detail table unavailable".to_string()));
        }
        self.inner.save_crypto_detail(detail).await
    }

    async fn find_crypto_detail(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<CryptoTransactionDetail>, LedgerError> {
        self.inner.find_crypto_detail(transaction_id).await
    }
}

#[async_trait]
impl LedgerUnit for FlakyUnit {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.inner.insert_transaction(transaction).await
    }

    async fn insert_entries(&mut self, entries: &[TransactionEntry]) -> Result<(), LedgerError> {
        self.inner.insert_entries(entries).await
    }

    async fn apply_delta(
        &mut self,
        account_id: AccountId,
        direction: Direction,
        amount: Decimal,
    ) -> Result<Account, LedgerError> {
        if self.fail_delta_for == Some(account_id) {
            return Err(LedgerError::Storage("write failed".to_string()));
        }
        self.inner.apply_delta(account_id, direction, amount).await
    }

    async fn transition(
        &mut self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<(), LedgerError> {
        self.inner.transition(id, from, to).await
    }

    async fn delete_draft(&mut self, id: TransactionId) -> Result<(), LedgerError> {
        self.inner.delete_draft(id).await
    }

    async fn commit(self) -> Result<(), LedgerError> {
        let conflicted = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            self.inner.rollback().await?;
            return Err(LedgerError::StorageConflict("injected".to_string()));
        }
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.inner.rollback().await
    }
}
