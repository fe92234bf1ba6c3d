//! Crypto transaction detail: metadata attached to a completed posting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CryptoDetailId, CurrencyCode, TransactionId};

use super::rate::RateOrigin;
use crate::ledger::LedgerError;

/// Foreign-currency metadata of one transaction (1:1).
///
/// Never balance-affecting; the posting stands even if this row is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoTransactionDetail {
    /// Unique identifier.
    pub id: CryptoDetailId,
    /// The owning transaction.
    pub transaction_id: TransactionId,
    /// Foreign currency code.
    pub currency: CurrencyCode,
    /// Network the currency lives on.
    pub network: String,
    /// Amount in the foreign currency, fee excluded.
    pub foreign_amount: Decimal,
    /// Rate applied to reach the base currency.
    pub rate: Decimal,
    /// Whether `rate` came from the live source or the fallback table.
    pub rate_origin: RateOrigin,
    /// External transaction hash, when one was validated.
    pub external_ref: Option<String>,
    /// Sending wallet.
    pub wallet_from: Option<String>,
    /// Receiving wallet.
    pub wallet_to: Option<String>,
    /// Network fee in the foreign currency.
    pub fee: Option<Decimal>,
    /// Block the external transaction landed in.
    pub block_number: Option<i64>,
    /// Number of confirmations seen at posting time.
    pub confirmation_count: i32,
    /// When the detail was recorded.
    pub created_at: DateTime<Utc>,
}

/// Storage for crypto details, alongside the ledger store.
#[async_trait]
pub trait CryptoDetailStore: Send + Sync {
    /// Saves the detail row of a transaction.
    async fn save_crypto_detail(&self, detail: &CryptoTransactionDetail) -> Result<(), LedgerError>;

    /// Finds the detail row of a transaction.
    async fn find_crypto_detail(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<CryptoTransactionDetail>, LedgerError>;
}
