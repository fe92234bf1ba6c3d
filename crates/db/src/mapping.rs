//! Conversions between database rows and ledger domain types.

use chrono::Utc;
use sea_orm::{DbErr, RuntimeErr, Set};
use tally_core::conversion::{CryptoTransactionDetail, RateOrigin};
use tally_core::ledger::{
    Account, AccountKind, Direction, LedgerError, Transaction, TransactionEntry, TransactionLinks,
    TransactionStatus, TransactionType,
};
use tally_shared::types::{
    AccountId, CategoryId, CounterpartyId, CryptoDetailId, CurrencyCode, EntryId, ProjectId,
    TransactionId,
};

use crate::entities::{
    accounts, crypto_transaction_details, sea_orm_active_enums as db, transaction_entries,
    transactions,
};

/// SQLSTATE codes Postgres uses when a concurrent writer wins.
const CONFLICT_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// SQLSTATE for `numeric_value_out_of_range`.
const NUMERIC_OVERFLOW_SQLSTATE: &str = "22003";

/// Maps a database error onto the ledger error space.
///
/// Serialization failures and deadlocks become `StorageConflict`, which the
/// engine retries. A value too large for its NUMERIC column is an
/// `AmountOverflow`. Everything else is a plain storage failure.
pub(crate) fn db_error(err: DbErr) -> LedgerError {
    match sqlstate(&err) {
        Some(code) if CONFLICT_SQLSTATES.contains(&code.as_str()) => {
            LedgerError::StorageConflict(err.to_string())
        }
        Some(code) if code == NUMERIC_OVERFLOW_SQLSTATE => LedgerError::AmountOverflow,
        _ => LedgerError::Storage(err.to_string()),
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db_err)))
        | DbErr::Query(RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(db_err))) => {
            db_err.code().map(|code| code.into_owned())
        }
        _ => None,
    }
}

fn currency(raw: &str) -> Result<CurrencyCode, LedgerError> {
    CurrencyCode::parse(raw)
        .map_err(|err| LedgerError::Storage(format!("stored currency '{raw}' is invalid: {err}")))
}

impl From<AccountKind> for db::AccountKind {
    fn from(kind: AccountKind) -> Self {
        match kind {
            AccountKind::Bank => Self::Bank,
            AccountKind::Crypto => Self::Crypto,
            AccountKind::Cash => Self::Cash,
            AccountKind::Investment => Self::Investment,
        }
    }
}

impl From<db::AccountKind> for AccountKind {
    fn from(kind: db::AccountKind) -> Self {
        match kind {
            db::AccountKind::Bank => Self::Bank,
            db::AccountKind::Crypto => Self::Crypto,
            db::AccountKind::Cash => Self::Cash,
            db::AccountKind::Investment => Self::Investment,
        }
    }
}

impl From<TransactionType> for db::TransactionType {
    fn from(kind: TransactionType) -> Self {
        match kind {
            TransactionType::Income => Self::Income,
            TransactionType::Expense => Self::Expense,
            TransactionType::Transfer => Self::Transfer,
        }
    }
}

impl From<db::TransactionType> for TransactionType {
    fn from(kind: db::TransactionType) -> Self {
        match kind {
            db::TransactionType::Income => Self::Income,
            db::TransactionType::Expense => Self::Expense,
            db::TransactionType::Transfer => Self::Transfer,
        }
    }
}

impl From<TransactionStatus> for db::TransactionStatus {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Draft => Self::Draft,
            TransactionStatus::Pending => Self::Pending,
            TransactionStatus::Completed => Self::Completed,
            TransactionStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<db::TransactionStatus> for TransactionStatus {
    fn from(status: db::TransactionStatus) -> Self {
        match status {
            db::TransactionStatus::Draft => Self::Draft,
            db::TransactionStatus::Pending => Self::Pending,
            db::TransactionStatus::Completed => Self::Completed,
            db::TransactionStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<Direction> for db::EntryDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Debit => Self::Debit,
            Direction::Credit => Self::Credit,
        }
    }
}

impl From<db::EntryDirection> for Direction {
    fn from(direction: db::EntryDirection) -> Self {
        match direction {
            db::EntryDirection::Debit => Self::Debit,
            db::EntryDirection::Credit => Self::Credit,
        }
    }
}

impl From<RateOrigin> for db::RateOrigin {
    fn from(origin: RateOrigin) -> Self {
        match origin {
            RateOrigin::Live => Self::Live,
            RateOrigin::Fallback => Self::Fallback,
        }
    }
}

impl From<db::RateOrigin> for RateOrigin {
    fn from(origin: db::RateOrigin) -> Self {
        match origin {
            db::RateOrigin::Live => Self::Live,
            db::RateOrigin::Fallback => Self::Fallback,
        }
    }
}

pub(crate) fn account_from_model(model: accounts::Model) -> Result<Account, LedgerError> {
    Ok(Account {
        id: AccountId::from_uuid(model.id),
        currency: currency(&model.currency)?,
        name: model.name,
        kind: model.kind.into(),
        balance: model.balance,
        is_active: model.is_active,
        version: model.version,
        description: model.description,
    })
}

pub(crate) fn account_to_active(account: &Account) -> accounts::ActiveModel {
    let now = Utc::now().into();
    accounts::ActiveModel {
        id: Set(account.id.into_inner()),
        name: Set(account.name.clone()),
        kind: Set(account.kind.into()),
        currency: Set(account.currency.to_string()),
        balance: Set(account.balance),
        is_active: Set(account.is_active),
        version: Set(account.version),
        description: Set(account.description.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

pub(crate) fn transaction_from_model(model: transactions::Model) -> Transaction {
    Transaction {
        id: TransactionId::from_uuid(model.id),
        description: model.description,
        transaction_type: model.transaction_type.into(),
        status: model.status.into(),
        total_amount: model.total_amount,
        transaction_date: model.transaction_date,
        links: TransactionLinks {
            project_id: model.project_id.map(ProjectId::from_uuid),
            category_id: model.category_id.map(CategoryId::from_uuid),
            counterparty_id: model.counterparty_id.map(CounterpartyId::from_uuid),
        },
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn transaction_to_active(transaction: &Transaction) -> transactions::ActiveModel {
    transactions::ActiveModel {
        id: Set(transaction.id.into_inner()),
        description: Set(transaction.description.clone()),
        transaction_type: Set(transaction.transaction_type.into()),
        status: Set(transaction.status.into()),
        total_amount: Set(transaction.total_amount),
        transaction_date: Set(transaction.transaction_date),
        project_id: Set(transaction.links.project_id.map(ProjectId::into_inner)),
        category_id: Set(transaction.links.category_id.map(CategoryId::into_inner)),
        counterparty_id: Set(transaction
            .links
            .counterparty_id
            .map(CounterpartyId::into_inner)),
        created_at: Set(transaction.created_at.into()),
        updated_at: Set(transaction.updated_at.into()),
    }
}

pub(crate) fn entry_from_model(model: transaction_entries::Model) -> TransactionEntry {
    TransactionEntry {
        id: EntryId::from_uuid(model.id),
        transaction_id: TransactionId::from_uuid(model.transaction_id),
        account_id: AccountId::from_uuid(model.account_id),
        direction: model.direction.into(),
        amount: model.amount,
        note: model.note,
    }
}

pub(crate) fn entry_to_active(entry: &TransactionEntry, line_no: i32) -> transaction_entries::ActiveModel {
    transaction_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        transaction_id: Set(entry.transaction_id.into_inner()),
        account_id: Set(entry.account_id.into_inner()),
        line_no: Set(line_no),
        direction: Set(entry.direction.into()),
        amount: Set(entry.amount),
        note: Set(entry.note.clone()),
        created_at: Set(Utc::now().into()),
    }
}

pub(crate) fn detail_from_model(
    model: crypto_transaction_details::Model,
) -> Result<CryptoTransactionDetail, LedgerError> {
    Ok(CryptoTransactionDetail {
        id: CryptoDetailId::from_uuid(model.id),
        transaction_id: TransactionId::from_uuid(model.transaction_id),
        currency: currency(&model.currency)?,
        network: model.network,
        foreign_amount: model.foreign_amount,
        rate: model.rate,
        rate_origin: model.rate_origin.into(),
        external_ref: model.external_ref,
        wallet_from: model.wallet_from,
        wallet_to: model.wallet_to,
        fee: model.fee,
        block_number: model.block_number,
        confirmation_count: model.confirmation_count,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub(crate) fn detail_to_active(
    detail: &CryptoTransactionDetail,
) -> crypto_transaction_details::ActiveModel {
    crypto_transaction_details::ActiveModel {
        id: Set(detail.id.into_inner()),
        transaction_id: Set(detail.transaction_id.into_inner()),
        currency: Set(detail.currency.to_string()),
        network: Set(detail.network.clone()),
        foreign_amount: Set(detail.foreign_amount),
        rate: Set(detail.rate),
        rate_origin: Set(detail.rate_origin.into()),
        external_ref: Set(detail.external_ref.clone()),
        wallet_from: Set(detail.wallet_from.clone()),
        wallet_to: Set(detail.wallet_to.clone()),
        fee: Set(detail.fee),
        block_number: Set(detail.block_number),
        confirmation_count: Set(detail.confirmation_count),
        created_at: Set(detail.created_at.into()),
    }
}
