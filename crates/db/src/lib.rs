//! Database layer with `SeaORM` entities, migrations and the Postgres
//! ledger store.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for accounts and link targets
//! - [`PgLedgerStore`], the persistent ledger store
//! - Database migrations

pub mod entities;
mod mapping;
pub mod migration;
pub mod repositories;
pub mod store;

pub use repositories::{AccountError, AccountFilter, AccountRepository, ReferenceRepository};
pub use store::{PgLedgerStore, PgUnit};

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tally_shared::config::DatabaseConfig;

/// Establishes a connection pool sized from the `database` config section.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
