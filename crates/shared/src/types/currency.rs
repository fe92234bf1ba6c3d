//! Currency codes.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are always `rust_decimal::Decimal`; this module only deals with
//! the currency label attached to them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a currency code fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyCodeError {
    /// Code is empty.
    #[error("Currency code cannot be empty")]
    Empty,

    /// Code has an invalid length.
    #[error("Currency code must be 3 to 5 characters: {0}")]
    InvalidLength(String),

    /// Code contains non-alphabetic characters.
    #[error("Currency code must be alphabetic: {0}")]
    InvalidCharacters(String),
}

/// An upper-case currency or token code (e.g. "USD", "TRX", "USDT").
///
/// Fiat codes are ISO 4217 (three letters); token tickers may be up to
/// five letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty, not 3-5 letters, or not alphabetic.
    pub fn parse(code: &str) -> Result<Self, CurrencyCodeError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(CurrencyCodeError::Empty);
        }
        if !(3..=5).contains(&trimmed.len()) {
            return Err(CurrencyCodeError::InvalidLength(trimmed.to_string()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CurrencyCodeError::InvalidCharacters(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}
