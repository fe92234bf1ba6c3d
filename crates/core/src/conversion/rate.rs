//! Conversion rates and base-currency arithmetic.
//!
//! CRITICAL: Rounding strategy:
//! - Always round to the base currency's decimal places
//! - Use banker's rounding (round half to even)
//! - Keep the foreign amount and the applied rate alongside the result

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tally_shared::types::CurrencyCode;
use thiserror::Error;

use crate::ledger::LedgerError;

/// Decimal places kept for a stored conversion rate.
pub const MAX_RATE_SCALE: u32 = 12;

/// Errors from a rate source.
#[derive(Debug, Error)]
pub enum RateError {
    /// Upstream call failed.
    #[error("Rate request failed: {0}")]
    Request(String),

    /// Upstream answered without a quote for the currency.
    #[error("No quote for {0}")]
    MissingQuote(String),

    /// Quote was zero, negative or unparsable.
    #[error("Invalid quote for {currency}: {value}")]
    InvalidQuote {
        /// Quoted currency.
        currency: String,
        /// Raw value received.
        value: String,
    },
}

/// Source of live conversion rates into the base currency.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Returns how many base-currency units one unit of `currency` is worth.
    async fn rate(&self, currency: &CurrencyCode) -> Result<Decimal, RateError>;
}

/// Where an applied rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateOrigin {
    /// Fetched from the rate source for this request.
    Live,
    /// Static configured rate used because the source failed.
    Fallback,
}

impl RateOrigin {
    /// Returns the lowercase storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for RateOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rate together with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRate {
    /// Quoted currency.
    pub currency: CurrencyCode,
    /// Base-currency units per foreign unit.
    pub rate: Decimal,
    /// Live or fallback.
    pub origin: RateOrigin,
}

/// Rounds a quoted rate to the precision it is stored at.
#[must_use]
pub fn normalize_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(MAX_RATE_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Converts a foreign amount into the base currency.
///
/// Uses banker's rounding (round half to even) to minimize cumulative errors.
///
/// # Errors
///
/// Returns `AmountOverflow` if the product is not representable.
pub fn convert_to_base(
    amount: Decimal,
    rate: Decimal,
    decimal_places: u32,
) -> Result<Decimal, LedgerError> {
    let converted = amount.checked_mul(rate).ok_or(LedgerError::AmountOverflow)?;
    Ok(converted.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven))
}
