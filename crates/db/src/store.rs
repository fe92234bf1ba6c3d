//! Postgres-backed ledger store.
//!
//! A [`PgUnit`] wraps one database transaction. Balance deltas are applied
//! with a single `UPDATE ... RETURNING`, so the row lock taken by the first
//! writer serializes every other unit touching the same account until it
//! commits. The update only matches active accounts. Status changes and draft deletes are conditional on the expected
//! current status; a miss means another writer got there first.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
};
use tally_core::conversion::{CryptoDetailStore, CryptoTransactionDetail};
use tally_core::ledger::{
    Account, Direction, LedgerError, LedgerStore, LedgerUnit, ReferenceKind, Transaction,
    TransactionEntry, TransactionFilter, TransactionStatus,
};
use tally_shared::types::{AccountId, PageRequest, PageResponse, TransactionId};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{
    accounts, categories, counterparties, crypto_transaction_details, projects,
    sea_orm_active_enums as db, transaction_entries, transactions,
};
use crate::mapping::{
    account_from_model, db_error, detail_from_model, detail_to_active, entry_from_model,
    entry_to_active, transaction_from_model, transaction_to_active,
};

const APPLY_DELTA_SQL: &str = r"
UPDATE accounts
SET balance = balance + $1, version = version + 1, updated_at = now()
WHERE id = $2 AND is_active
RETURNING *
";

const TRANSITION_SQL: &str = r"
UPDATE transactions
SET status = $1::transaction_status, updated_at = now()
WHERE id = $2 AND status = $3::transaction_status
";

const DELETE_DRAFT_SQL: &str = r"
DELETE FROM transactions
WHERE id = $1 AND status = 'draft'
";

/// Ledger store over a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a store over an existing connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Unit = PgUnit;

    async fn begin(&self) -> Result<Self::Unit, LedgerError> {
        let txn = self.db.begin().await.map_err(db_error)?;
        Ok(PgUnit { txn })
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(account_from_model)
            .transpose()
    }

    async fn reference_exists(&self, kind: ReferenceKind, id: Uuid) -> Result<bool, LedgerError> {
        let count = match kind {
            ReferenceKind::Account => accounts::Entity::find_by_id(id).count(&self.db).await,
            ReferenceKind::Project => projects::Entity::find_by_id(id).count(&self.db).await,
            ReferenceKind::Category => categories::Entity::find_by_id(id).count(&self.db).await,
            ReferenceKind::Counterparty => {
                counterparties::Entity::find_by_id(id).count(&self.db).await
            }
        }
        .map_err(db_error)?;
        Ok(count > 0)
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        let model = transactions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_error)?;
        Ok(model.map(transaction_from_model))
    }

    async fn find_entries(&self, id: TransactionId) -> Result<Vec<TransactionEntry>, LedgerError> {
        let models = transaction_entries::Entity::find()
            .filter(transaction_entries::Column::TransactionId.eq(id.into_inner()))
            .order_by_asc(transaction_entries::Column::LineNo)
            .all(&self.db)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(entry_from_model).collect())
    }

    async fn find_completed_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionEntry>, LedgerError> {
        let models = transaction_entries::Entity::find()
            .inner_join(transactions::Entity)
            .filter(transaction_entries::Column::AccountId.eq(account_id.into_inner()))
            .filter(transactions::Column::Status.eq(db::TransactionStatus::Completed))
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transaction_entries::Column::LineNo)
            .all(&self.db)
            .await
            .map_err(db_error)?;
        Ok(models.into_iter().map(entry_from_model).collect())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        let mut query = transactions::Entity::find();
        if let Some(transaction_type) = filter.transaction_type {
            query = query.filter(
                transactions::Column::TransactionType.eq(db::TransactionType::from(transaction_type)),
            );
        }
        if let Some(status) = filter.status {
            query = query.filter(transactions::Column::Status.eq(db::TransactionStatus::from(status)));
        }
        if let Some(project_id) = filter.project_id {
            query = query.filter(transactions::Column::ProjectId.eq(project_id.into_inner()));
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(transactions::Column::CategoryId.eq(category_id.into_inner()));
        }
        if let Some(counterparty_id) = filter.counterparty_id {
            query =
                query.filter(transactions::Column::CounterpartyId.eq(counterparty_id.into_inner()));
        }

        let total = query.clone().count(&self.db).await.map_err(db_error)?;
        let models = query
            .order_by_desc(transactions::Column::TransactionDate)
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_error)?;

        let data = models.into_iter().map(transaction_from_model).collect();
        Ok(PageResponse::new(data, page, total))
    }
}

#[async_trait]
impl CryptoDetailStore for PgLedgerStore {
    async fn save_crypto_detail(&self, detail: &CryptoTransactionDetail) -> Result<(), LedgerError> {
        crypto_transaction_details::Entity::insert(detail_to_active(detail))
            .exec(&self.db)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_crypto_detail(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<CryptoTransactionDetail>, LedgerError> {
        crypto_transaction_details::Entity::find()
            .filter(crypto_transaction_details::Column::TransactionId.eq(transaction_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(detail_from_model)
            .transpose()
    }
}

/// One Postgres transaction acting as a ledger unit of work.
pub struct PgUnit {
    txn: DatabaseTransaction,
}

impl PgUnit {
    async fn execute(&self, sql: &str, values: Vec<sea_orm::Value>) -> Result<u64, LedgerError> {
        let result = self
            .txn
            .execute(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LedgerUnit for PgUnit {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        transactions::Entity::insert(transaction_to_active(transaction))
            .exec(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn insert_entries(&mut self, entries: &[TransactionEntry]) -> Result<(), LedgerError> {
        if entries.is_empty() {
            return Ok(());
        }
        let models = entries
            .iter()
            .zip(1..)
            .map(|(entry, line_no)| entry_to_active(entry, line_no));
        transaction_entries::Entity::insert_many(models)
            .exec(&self.txn)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn apply_delta(
        &mut self,
        account_id: AccountId,
        direction: Direction,
        amount: Decimal,
    ) -> Result<Account, LedgerError> {
        let delta = direction.signed(amount);
        let updated = accounts::Entity::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Postgres,
                APPLY_DELTA_SQL,
                [delta.into(), account_id.into_inner().into()],
            ))
            .one(&self.txn)
            .await
            .map_err(db_error)?;

        // No row means missing or inactive; the update did not say which.
        let Some(model) = updated else {
            let exists = accounts::Entity::find_by_id(account_id.into_inner())
                .one(&self.txn)
                .await
                .map_err(db_error)?
                .is_some();
            return Err(if exists {
                LedgerError::AccountInactive(account_id)
            } else {
                LedgerError::account_not_found(account_id)
            });
        };

        debug!(account_id = %account_id, delta = %delta, version = model.version, "Balance delta applied");
        account_from_model(model)
    }

    async fn transition(
        &mut self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<(), LedgerError> {
        let affected = self
            .execute(
                TRANSITION_SQL,
                vec![to.as_str().into(), id.into_inner().into(), from.as_str().into()],
            )
            .await?;
        if affected == 0 {
            return Err(LedgerError::StorageConflict(format!(
                "transaction {id} is no longer {from}"
            )));
        }
        Ok(())
    }

    async fn delete_draft(&mut self, id: TransactionId) -> Result<(), LedgerError> {
        let affected = self
            .execute(DELETE_DRAFT_SQL, vec![id.into_inner().into()])
            .await?;
        if affected == 0 {
            return Err(LedgerError::StorageConflict(format!(
                "transaction {id} is no longer a draft"
            )));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.txn.commit().await.map_err(db_error)
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.txn.rollback().await.map_err(db_error)
    }
}
