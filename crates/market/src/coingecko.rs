//! CoinGecko `simple/price` rate source.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tally_core::conversion::{RateError, RateSource};
use tally_shared::types::CurrencyCode;
use tracing::debug;

const VS_CURRENCY: &str = "usd";

/// Maps a ticker to CoinGecko's coin id.
#[must_use]
pub fn coin_id(currency: &CurrencyCode) -> Option<&'static str> {
    match currency.as_str() {
        "TRX" => Some("tron"),
        "USDT" => Some("tether"),
        _ => None,
    }
}

/// Extracts `body[coin][usd]` as an exact decimal.
///
/// CoinGecko answers `{"tron":{"usd":0.1234}}`. `serde_json` holds a JSON
/// number as an `f64`, so the decimal is built from that float's shortest
/// rendering: quotes with up to 15 significant digits come back exactly as
/// sent, longer ones keep only what an `f64` carries. Quotes sent as JSON
/// strings are read digit for digit.
pub fn parse_price(body: &Value, coin: &str, currency: &CurrencyCode) -> Result<Decimal, RateError> {
    let raw = body
        .get(coin)
        .and_then(|quotes| quotes.get(VS_CURRENCY))
        .ok_or_else(|| RateError::MissingQuote(currency.to_string()))?;

    let invalid = || RateError::InvalidQuote {
        currency: currency.to_string(),
        value: raw.to_string(),
    };
    let text = match raw {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        _ => return Err(invalid()),
    };
    let rate = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| invalid())?;

    if rate <= Decimal::ZERO {
        return Err(invalid());
    }
    Ok(rate)
}

/// Live USD quotes from CoinGecko.
#[derive(Debug, Clone)]
pub struct CoinGeckoRateSource {
    client: Client,
    base_url: String,
}

impl CoinGeckoRateSource {
    /// Creates a source against `base_url`, e.g. `https://api.coingecko.com/api/v3`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateSource for CoinGeckoRateSource {
    async fn rate(&self, currency: &CurrencyCode) -> Result<Decimal, RateError> {
        let coin = coin_id(currency).ok_or_else(|| RateError::MissingQuote(currency.to_string()))?;

        let response = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", coin), ("vs_currencies", VS_CURRENCY)])
            .send()
            .await
            .map_err(|e| RateError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RateError::Request(format!(
                "CoinGecko returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RateError::Request(format!("Failed to parse CoinGecko response: {e}")))?;
        let rate = parse_price(&body, coin, currency)?;

        debug!(currency = %currency, rate = %rate, "Live rate fetched");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn trx() -> CurrencyCode {
        CurrencyCode::parse("TRX").unwrap()
    }

    #[rstest]
    #[case(json!({"tron": {"usd": 0.1234}}), dec!(0.1234))]
    #[case(json!({"tron": {"usd": "0.10"}}), dec!(0.10))]
    #[case(json!({"tron": {"usd": 2.5e-1}}), dec!(0.25))]
    #[case(json!({"tron": {"usd": 0.1}}), dec!(0.1))]
    #[case(json!({"tron": {"usd": "0.1234567890123456789"}}), dec!(0.1234567890123456789))]
    fn test_parse_price(#[case] body: Value, #[case] expected: Decimal) {
        assert_eq!(parse_price(&body, "tron", &trx()).unwrap(), expected);
    }

    #[test]
    fn test_long_numeric_quote_keeps_float_digits() {
        let body: Value = serde_json::from_str(r#"{"tron":{"usd":0.1234567890123456789}}"#).unwrap();
        assert_eq!(
            parse_price(&body, "tron", &trx()).unwrap(),
            dec!(0.12345678901234568)
        );
    }

    #[test]
    fn test_parse_price_missing_coin() {
        let err = parse_price(&json!({"tether": {"usd": 1}}), "tron", &trx()).unwrap_err();
        assert!(matches!(err, RateError::MissingQuote(code) if code == "TRX"));
    }

    #[rstest]
    #[case(json!({"tron": {"usd": 0}}))]
    #[case(json!({"tron": {"usd": -1}}))]
    #[case(json!({"tron": {"usd": null}}))]
    #[case(json!({"tron": {"usd": "n/a"}}))]
    fn test_parse_price_rejects_bad_quotes(#[case] body: Value) {
        assert!(matches!(
            parse_price(&body, "tron", &trx()),
            Err(RateError::InvalidQuote { .. })
        ));
    }

    #[test]
    fn test_coin_ids() {
        assert_eq!(coin_id(&trx()), Some("tron"));
        assert_eq!(coin_id(&CurrencyCode::parse("usdt").unwrap()), Some("tether"));
        assert_eq!(coin_id(&CurrencyCode::parse("BTC").unwrap()), None);
    }
}
