//! Double-entry bookkeeping logic.
//!
//! This module implements the core ledger functionality:
//! - Accounts and their running balances
//! - Ledger entries (debits and credits) and the transaction aggregate
//! - Business rule validation
//! - The storage seam and an in-memory store
//! - The posting engine and the read model

pub mod account;
pub mod engine;
pub mod entry;
pub mod error;
pub mod memory;
pub mod read;
pub mod store;
pub mod transaction;
pub mod types;
pub mod validation;

#[cfg(test)]
mod engine_props;
#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod validation_props;

pub use account::{Account, AccountKind, NewAccount};
pub use engine::LedgerEngine;
pub use entry::{Direction, EntryInput, TransactionEntry};
pub use error::LedgerError;
pub use memory::{MemoryLedgerStore, MemoryUnit};
pub use read::{BalanceAudit, EntryView, LedgerReader, TransactionWithEntries};
pub use store::{LedgerStore, LedgerUnit};
pub use transaction::{
    Transaction, TransactionFilter, TransactionLinks, TransactionStatus, TransactionType,
};
pub use types::{EntryTotals, PostTransactionInput, PostedTransaction, ReferenceKind, SimplePosting};
pub use validation::{MAX_AMOUNT_SCALE, check_scale};
