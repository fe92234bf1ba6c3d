//! Demo data seeder for the Tally ledger.
//!
//! Opens a small chart of accounts, a project, a category and a
//! counterparty, then posts one base-currency income and one TRX expense
//! through the ledger engine. Does nothing if any account already exists.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rust_decimal::Decimal;
use tally_core::conversion::{ConversionService, ForeignKind, ForeignPostingInput};
use tally_core::ledger::{AccountKind, LedgerEngine, NewAccount, SimplePosting, TransactionLinks};
use tally_db::{AccountFilter, AccountRepository, PgLedgerStore, ReferenceRepository};
use tally_shared::AppConfig;
use tally_shared::types::CurrencyCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tally=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let db = tally_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let accounts = AccountRepository::new(db.clone());
    if !accounts.list_accounts(AccountFilter::default()).await?.is_empty() {
        info!("Accounts already exist, skipping seed");
        return Ok(());
    }

    let usd = CurrencyCode::parse(&config.ledger.base_currency)
        .context("Configured base currency is invalid")?;
    let trx = CurrencyCode::parse("TRX")?;
    let usdt = CurrencyCode::parse("USDT")?;

    let operating = accounts
        .create_account(NewAccount::new("Operating", AccountKind::Bank, usd.clone()))
        .await?;
    let trx_wallet = accounts
        .create_account(NewAccount::new("TRX Wallet", AccountKind::Crypto, trx))
        .await?;
    accounts
        .create_account(NewAccount::new("USDT Wallet", AccountKind::Crypto, usdt))
        .await?;
    accounts
        .create_account(NewAccount::new("Petty Cash", AccountKind::Cash, usd.clone()))
        .await?;
    let treasury = accounts
        .create_account(NewAccount::new("Treasury Bills", AccountKind::Investment, usd))
        .await?;

    let references = ReferenceRepository::new(db.clone());
    let links = TransactionLinks {
        project_id: Some(references.create_project("Website Relaunch").await?),
        category_id: Some(references.create_category("Hosting").await?),
        counterparty_id: Some(references.create_counterparty("Acme Cloud").await?),
    };
    info!("Reference data seeded");

    let store = Arc::new(PgLedgerStore::new(db));
    let engine = LedgerEngine::from_config(store, &config.ledger);

    let today = Utc::now().date_naive();
    let income = engine
        .post_income(
            operating.id,
            treasury.id,
            SimplePosting::new("Treasury bill redemption", Decimal::new(250_000, 2), today),
        )
        .await
        .context("Failed to post demo income")?;
    info!(transaction_id = %income.transaction.id, "Demo income posted");

    let (rates, explorer) =
        tally_market::from_config(&config.conversion).context("Failed to build HTTP client")?;
    let conversion = ConversionService::new(
        engine,
        Arc::new(rates),
        Arc::new(explorer),
        &config.conversion,
        &config.ledger,
    );

    let mut rent = ForeignPostingInput::new(
        ForeignKind::Expense,
        Decimal::new(500, 0),
        "TRX",
        "Server rent",
        trx_wallet.id,
        operating.id,
    )
    .with_fee(Decimal::ONE);
    rent.links = links;

    let posted = conversion
        .post_foreign_transaction(rent)
        .await
        .context("Failed to post demo crypto expense")?;
    info!(
        transaction_id = %posted.posting.transaction.id,
        base_amount = %posted.base_amount,
        rate = %posted.rate.rate,
        "Demo crypto expense posted"
    );
    if let Some(warning) = posted.detail_warning {
        warn!(%warning, "Crypto detail not saved");
    }

    info!("Seeding complete");
    Ok(())
}
