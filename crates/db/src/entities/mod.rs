//! `SeaORM` entity definitions for the ledger schema.

pub mod accounts;
pub mod categories;
pub mod counterparties;
pub mod crypto_transaction_details;
pub mod projects;
pub mod sea_orm_active_enums;
pub mod transaction_entries;
pub mod transactions;
