//! Account repository: opening, listing and deactivating ledger accounts.
//!
//! Balances are never written here; only the ledger store moves them.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use tally_core::ledger::{Account, AccountKind, LedgerError, NewAccount};
use tally_shared::types::AccountId;
use tracing::info;

use crate::entities::{accounts, sea_orm_active_enums as db};
use crate::mapping::{account_from_model, account_to_active};

/// Error types for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Account not found.
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    /// Stored row could not be mapped to an account.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Filter options for listing accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Filter by kind.
    pub kind: Option<AccountKind>,
    /// Filter by active status.
    pub is_active: Option<bool>,
}

/// Account repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Opens an account with a zero balance.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, AccountError> {
        let account = Account::open(input);
        let model = account_to_active(&account).insert(&self.db).await?;
        info!(account_id = %account.id, kind = %account.kind, currency = %account.currency, "Account opened");
        Ok(account_from_model(model)?)
    }

    /// Gets an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AccountError> {
        let model = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(AccountError::NotFound(id))?;
        Ok(account_from_model(model)?)
    }

    /// Lists accounts by name.
    pub async fn list_accounts(&self, filter: AccountFilter) -> Result<Vec<Account>, AccountError> {
        let mut query = accounts::Entity::find();
        if let Some(kind) = filter.kind {
            query = query.filter(accounts::Column::Kind.eq(db::AccountKind::from(kind)));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(accounts::Column::IsActive.eq(is_active));
        }

        let models = query
            .order_by_asc(accounts::Column::Name)
            .all(&self.db)
            .await?;
        models
            .into_iter()
            .map(|model| account_from_model(model).map_err(AccountError::from))
            .collect()
    }

    /// Marks an account inactive. The row, balance and entries stay; new
    /// postings against it are rejected.
    pub async fn deactivate_account(&self, id: AccountId) -> Result<Account, AccountError> {
        let model = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(AccountError::NotFound(id))?;

        let mut active = model.into_active_model();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        let model = active.update(&self.db).await?;

        info!(account_id = %id, "Account deactivated");
        Ok(account_from_model(model)?)
    }
}
