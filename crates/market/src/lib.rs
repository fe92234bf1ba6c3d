//! HTTP adapters for the conversion overlay's collaborators.
//!
//! - [`CoinGeckoRateSource`] quotes supported currencies in USD
//! - [`TronScanValidator`] looks up TRON transaction hashes
//!
//! Response parsing lives in pure functions so it can be tested without a
//! network.

pub mod coingecko;
pub mod tronscan;

pub use coingecko::CoinGeckoRateSource;
pub use tronscan::TronScanValidator;

use std::time::Duration;

use tally_shared::config::ConversionConfig;

const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));

/// Builds the shared HTTP client. The request timeout matches the lookup
/// timeout so a slow upstream is cut off on both sides.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(config: &ConversionConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.lookup_timeout())
        .connect_timeout(Duration::from_secs(5))
        .gzip(true)
        .build()
}

/// Builds both adapters from the `conversion` config section.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn from_config(
    config: &ConversionConfig,
) -> reqwest::Result<(CoinGeckoRateSource, TronScanValidator)> {
    let client = http_client(config)?;
    Ok((
        CoinGeckoRateSource::new(client.clone(), &config.rate_api_url),
        TronScanValidator::new(client, &config.explorer_api_url),
    ))
}
