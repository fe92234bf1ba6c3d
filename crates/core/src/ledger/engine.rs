//! Ledger engine: validates and commits balanced transactions.
//!
//! Every operation validates first, then opens one unit of work, so a
//! rejected request never writes. A `StorageConflict` during the unit is
//! retried from scratch up to `max_commit_retries` times.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tally_shared::config::LedgerConfig;
use tally_shared::types::{AccountId, TransactionId};
use tracing::{debug, info, warn};

use super::account::Account;
use super::entry::{EntryInput, TransactionEntry};
use super::error::LedgerError;
use super::store::{LedgerStore, LedgerUnit};
use super::transaction::{Transaction, TransactionLinks, TransactionStatus, TransactionType};
use super::types::{PostTransactionInput, PostedTransaction, SimplePosting};
use super::validation::{validate_entries, validate_transition};

const DEFAULT_MAX_COMMIT_RETRIES: u32 = 3;

/// Double-entry posting engine over a [`LedgerStore`].
pub struct LedgerEngine<S> {
    store: Arc<S>,
    max_commit_retries: u32,
}

impl<S> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_commit_retries: self.max_commit_retries,
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Creates an engine with the default retry budget.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        }
    }

    /// Creates an engine configured from the `ledger` config section.
    #[must_use]
    pub fn from_config(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            store,
            max_commit_retries: config.max_commit_retries,
        }
    }

    /// Overrides how many times a conflicting commit is retried.
    #[must_use]
    pub fn with_max_commit_retries(mut self, retries: u32) -> Self {
        self.max_commit_retries = retries;
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validates and posts a transaction, applying every leg to its account
    /// in one atomic unit.
    ///
    /// # Errors
    ///
    /// Validation and reference errors before any write; storage errors after
    /// a full rollback.
    pub async fn post_transaction(
        &self,
        input: PostTransactionInput,
    ) -> Result<PostedTransaction, LedgerError> {
        validate_input(&input)?;

        let mut attempt = 0;
        loop {
            match self.try_create(&input, TransactionStatus::Completed).await {
                Err(err) if self.should_retry(&err, &mut attempt, "post_transaction") => {
                    tokio::task::yield_now().await;
                }
                result => return result,
            }
        }
    }

    /// Posts income: bank account DEBIT, income account CREDIT.
    pub async fn post_income(
        &self,
        bank_account: AccountId,
        income_account: AccountId,
        posting: SimplePosting,
    ) -> Result<PostedTransaction, LedgerError> {
        self.post_transaction(PostTransactionInput::income(bank_account, income_account, posting))
            .await
    }

    /// Posts an expense: expense account DEBIT, bank account CREDIT.
    pub async fn post_expense(
        &self,
        expense_account: AccountId,
        bank_account: AccountId,
        posting: SimplePosting,
    ) -> Result<PostedTransaction, LedgerError> {
        self.post_transaction(PostTransactionInput::expense(expense_account, bank_account, posting))
            .await
    }

    /// Posts a transfer: destination DEBIT, source CREDIT.
    pub async fn post_transfer(
        &self,
        from_account: AccountId,
        to_account: AccountId,
        posting: SimplePosting,
    ) -> Result<PostedTransaction, LedgerError> {
        self.post_transaction(PostTransactionInput::transfer(from_account, to_account, posting))
            .await
    }

    /// Posts caller-supplied legs, e.g. a split across several accounts.
    pub async fn post_complex(
        &self,
        description: impl Into<String>,
        transaction_type: TransactionType,
        transaction_date: NaiveDate,
        links: TransactionLinks,
        entries: Vec<EntryInput>,
    ) -> Result<PostedTransaction, LedgerError> {
        self.post_transaction(PostTransactionInput::complex(
            description,
            transaction_type,
            transaction_date,
            links,
            entries,
        ))
        .await
    }

    /// Stores a validated transaction as a draft. Balances are untouched.
    pub async fn save_draft(
        &self,
        input: PostTransactionInput,
    ) -> Result<PostedTransaction, LedgerError> {
        validate_input(&input)?;

        let mut attempt = 0;
        loop {
            match self.try_create(&input, TransactionStatus::Draft).await {
                Err(err) if self.should_retry(&err, &mut attempt, "save_draft") => {
                    tokio::task::yield_now().await;
                }
                result => return result,
            }
        }
    }

    /// Moves a draft to pending.
    pub async fn submit_draft(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.change_status(id, TransactionStatus::Pending).await
    }

    /// Abandons a draft or pending transaction.
    pub async fn cancel_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.change_status(id, TransactionStatus::Cancelled).await
    }

    /// Completes a draft or pending transaction, applying its stored entries.
    pub async fn complete_transaction(
        &self,
        id: TransactionId,
    ) -> Result<PostedTransaction, LedgerError> {
        let mut attempt = 0;
        loop {
            match self.try_complete(id).await {
                Err(err) if self.should_retry(&err, &mut attempt, "complete_transaction") => {
                    tokio::task::yield_now().await;
                }
                result => return result,
            }
        }
    }

    /// Deletes a draft and its entries.
    ///
    /// # Errors
    ///
    /// `CanOnlyDeleteDraft` for any other status.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<(), LedgerError> {
        let mut attempt = 0;
        loop {
            match self.try_delete(id).await {
                Err(err) if self.should_retry(&err, &mut attempt, "delete_transaction") => {
                    tokio::task::yield_now().await;
                }
                result => return result,
            }
        }
    }

    fn should_retry(&self, err: &LedgerError, attempt: &mut u32, operation: &str) -> bool {
        if !err.is_retryable() || *attempt >= self.max_commit_retries {
            return false;
        }
        *attempt += 1;
        warn!(
            operation,
            attempt = *attempt,
            error = %err,
            "Retrying after storage conflict"
        );
        true
    }

    /// Checks links first, then each entry account in order.
    async fn resolve_references(
        &self,
        links: &TransactionLinks,
        accounts: &[AccountId],
    ) -> Result<(), LedgerError> {
        for (kind, id) in links.references() {
            if !self.store.reference_exists(kind, id).await? {
                return Err(LedgerError::NotFound { kind, id });
            }
        }

        for &account_id in accounts {
            let account = self
                .store
                .find_account(account_id)
                .await?
                .ok_or_else(|| LedgerError::account_not_found(account_id))?;
            if !account.is_active {
                return Err(LedgerError::AccountInactive(account_id));
            }
        }

        Ok(())
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.store
            .find_transaction(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    async fn try_create(
        &self,
        input: &PostTransactionInput,
        target: TransactionStatus,
    ) -> Result<PostedTransaction, LedgerError> {
        let account_ids: Vec<AccountId> = input.entries.iter().map(|e| e.account_id).collect();
        self.resolve_references(&input.links, &account_ids).await?;

        let now = Utc::now();
        let mut transaction = Transaction {
            id: TransactionId::new(),
            description: input.description.clone(),
            transaction_type: input.transaction_type,
            status: if target == TransactionStatus::Draft {
                TransactionStatus::Draft
            } else {
                TransactionStatus::Pending
            },
            total_amount: input.total_amount,
            transaction_date: input.transaction_date,
            links: input.links,
            created_at: now,
            updated_at: now,
        };
        let entries: Vec<TransactionEntry> = input
            .entries
            .iter()
            .map(|entry| TransactionEntry::from_input(transaction.id, entry))
            .collect();

        let mut unit = self.store.begin().await?;
        let staged = stage_new(&mut unit, &transaction, &entries, target).await;
        let accounts = match staged {
            Ok(accounts) => accounts,
            Err(err) => return Err(abort(unit, err).await),
        };
        unit.commit().await?;

        transaction.status = target;
        info!(
            transaction_id = %transaction.id,
            status = %transaction.status,
            total = %transaction.total_amount,
            entries = entries.len(),
            "Transaction stored"
        );

        Ok(PostedTransaction {
            transaction,
            entries,
            accounts,
        })
    }

    async fn try_complete(&self, id: TransactionId) -> Result<PostedTransaction, LedgerError> {
        let mut transaction = self.find_transaction(id).await?;
        validate_transition(transaction.status, TransactionStatus::Completed)?;

        let entries = self.store.find_entries(id).await?;
        let account_ids: Vec<AccountId> = entries.iter().map(|e| e.account_id).collect();
        self.resolve_references(&transaction.links, &account_ids).await?;

        let mut unit = self.store.begin().await?;
        let staged = async {
            unit.transition(id, transaction.status, TransactionStatus::Completed)
                .await?;
            apply_deltas(&mut unit, &entries).await
        }
        .await;
        let accounts = match staged {
            Ok(accounts) => accounts,
            Err(err) => return Err(abort(unit, err).await),
        };
        unit.commit().await?;

        transaction.status = TransactionStatus::Completed;
        transaction.updated_at = Utc::now();
        info!(transaction_id = %id, total = %transaction.total_amount, "Transaction completed");

        Ok(PostedTransaction {
            transaction,
            entries,
            accounts,
        })
    }

    async fn change_status(
        &self,
        id: TransactionId,
        to: TransactionStatus,
    ) -> Result<Transaction, LedgerError> {
        let mut attempt = 0;
        loop {
            match self.try_change_status(id, to).await {
                Err(err) if self.should_retry(&err, &mut attempt, "change_status") => {
                    tokio::task::yield_now().await;
                }
                result => return result,
            }
        }
    }

    async fn try_change_status(
        &self,
        id: TransactionId,
        to: TransactionStatus,
    ) -> Result<Transaction, LedgerError> {
        let mut transaction = self.find_transaction(id).await?;
        validate_transition(transaction.status, to)?;

        let mut unit = self.store.begin().await?;
        if let Err(err) = unit.transition(id, transaction.status, to).await {
            return Err(abort(unit, err).await);
        }
        unit.commit().await?;

        info!(transaction_id = %id, from = %transaction.status, to = %to, "Transaction status changed");
        transaction.status = to;
        transaction.updated_at = Utc::now();
        Ok(transaction)
    }

    async fn try_delete(&self, id: TransactionId) -> Result<(), LedgerError> {
        let transaction = self.find_transaction(id).await?;
        if !transaction.is_deletable() {
            return Err(LedgerError::CanOnlyDeleteDraft);
        }

        let mut unit = self.store.begin().await?;
        if let Err(err) = unit.delete_draft(id).await {
            return Err(abort(unit, err).await);
        }
        unit.commit().await?;

        info!(transaction_id = %id, "Draft transaction deleted");
        Ok(())
    }
}

fn validate_input(input: &PostTransactionInput) -> Result<(), LedgerError> {
    validate_entries(&input.entries, input.total_amount)
        .map(|_| ())
        .inspect_err(|err| {
            debug!(
                description = %input.description,
                error_code = err.error_code(),
                "Posting rejected by validation"
            );
        })
}

async fn stage_new<U: LedgerUnit>(
    unit: &mut U,
    transaction: &Transaction,
    entries: &[TransactionEntry],
    target: TransactionStatus,
) -> Result<Vec<Account>, LedgerError> {
    unit.insert_transaction(transaction).await?;
    unit.insert_entries(entries).await?;

    if target == TransactionStatus::Draft {
        return Ok(Vec::new());
    }

    let accounts = apply_deltas(unit, entries).await?;
    unit.transition(transaction.id, TransactionStatus::Pending, target)
        .await?;
    Ok(accounts)
}

/// Applies every entry's delta, touching accounts in ascending id order so
/// that concurrent units lock rows in the same sequence.
async fn apply_deltas<U: LedgerUnit>(
    unit: &mut U,
    entries: &[TransactionEntry],
) -> Result<Vec<Account>, LedgerError> {
    let mut ordered: Vec<&TransactionEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.account_id);

    let mut touched = BTreeMap::new();
    for entry in ordered {
        let account = unit
            .apply_delta(entry.account_id, entry.direction, entry.amount)
            .await?;
        touched.insert(account.id, account);
    }
    Ok(touched.into_values().collect())
}

async fn abort<U: LedgerUnit>(unit: U, err: LedgerError) -> LedgerError {
    if let Err(rollback_err) = unit.rollback().await {
        warn!(error = %rollback_err, "Rollback failed");
    }
    err
}
