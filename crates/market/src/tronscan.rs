//! TronScan transaction lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tally_core::conversion::{ExternalTransfer, ReferenceError, ReferenceValidator};
use tracing::debug;

/// TRX has 6 decimals; fees are reported in sun.
const SUN_SCALE: u32 = 6;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInfo {
    contract_ret: Option<String>,
    #[serde(default)]
    confirmed: bool,
    block_number: Option<i64>,
    timestamp: Option<i64>,
    owner_address: Option<String>,
    to_address: Option<String>,
    #[serde(default)]
    cost: Cost,
}

#[derive(Debug, Default, Deserialize)]
struct Cost {
    net_fee: Option<i64>,
}

/// Reads a `transaction-info` body.
///
/// An empty object means TronScan does not know the hash. A transfer counts
/// as confirmed only when it executed successfully and TronScan marks it
/// confirmed.
pub fn parse_transaction_info(body: &str) -> Result<Option<ExternalTransfer>, ReferenceError> {
    let info: TransactionInfo = serde_json::from_str(body)
        .map_err(|e| ReferenceError::Malformed(format!("transaction-info: {e}")))?;

    let Some(contract_ret) = info.contract_ret else {
        return Ok(None);
    };

    Ok(Some(ExternalTransfer {
        confirmed: contract_ret == "SUCCESS" && info.confirmed,
        block_number: info.block_number,
        fee: info.cost.net_fee.map(|sun| Decimal::new(sun, SUN_SCALE)),
        from_address: info.owner_address,
        to_address: info.to_address,
        timestamp: info.timestamp.and_then(DateTime::<Utc>::from_timestamp_millis),
    }))
}

/// Reference validator backed by the TronScan API.
#[derive(Debug, Clone)]
pub struct TronScanValidator {
    client: Client,
    base_url: String,
}

impl TronScanValidator {
    /// Creates a validator against `base_url`, e.g. `https://apilist.tronscan.org/api`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReferenceValidator for TronScanValidator {
    async fn lookup(&self, reference: &str) -> Result<Option<ExternalTransfer>, ReferenceError> {
        let response = self
            .client
            .get(format!("{}/transaction-info", self.base_url))
            .query(&[("hash", reference)])
            .send()
            .await
            .map_err(|e| ReferenceError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(ReferenceError::Request(format!("TronScan returned {status}")));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReferenceError::Request(e.to_string()))?;
        let transfer = parse_transaction_info(&body)?;

        debug!(
            reference,
            found = transfer.is_some(),
            confirmed = transfer.as_ref().is_some_and(|t| t.confirmed),
            "TronScan lookup"
        );
        Ok(transfer)
    }
}
