//! Application configuration management.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Foreign-currency conversion configuration.
    #[serde(default)]
    pub conversion: ConversionConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// The single currency every balance is normalized to.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Decimal places used when rounding converted base amounts.
    #[serde(default = "default_base_decimal_places")]
    pub base_decimal_places: u32,
    /// How many times a posting is retried after a storage conflict.
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_base_decimal_places() -> u32 {
    2
}

fn default_max_commit_retries() -> u32 {
    3
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            base_decimal_places: default_base_decimal_places(),
            max_commit_retries: default_max_commit_retries(),
        }
    }
}

/// Foreign-currency conversion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    /// Timeout applied to every rate or explorer lookup, in milliseconds.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Static rates used when the live rate source is unavailable.
    #[serde(default = "default_fallback_rates")]
    pub fallback_rates: HashMap<String, Decimal>,
    /// Base URL of the price API.
    #[serde(default = "default_rate_api_url")]
    pub rate_api_url: String,
    /// Base URL of the blockchain explorer API.
    #[serde(default = "default_explorer_api_url")]
    pub explorer_api_url: String,
}

fn default_lookup_timeout_ms() -> u64 {
    5_000
}

fn default_fallback_rates() -> HashMap<String, Decimal> {
    HashMap::from([
        ("TRX".to_string(), Decimal::new(10, 2)),
        ("USDT".to_string(), Decimal::ONE),
    ])
}

fn default_rate_api_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_explorer_api_url() -> String {
    "https://apilist.tronscan.org/api".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: default_lookup_timeout_ms(),
            fallback_rates: default_fallback_rates(),
            rate_api_url: default_rate_api_url(),
            explorer_api_url: default_explorer_api_url(),
        }
    }
}

impl ConversionConfig {
    /// Returns the fallback rate for a currency code, matched case-insensitively.
    #[must_use]
    pub fn fallback_rate(&self, code: &str) -> Option<Decimal> {
        self.fallback_rates
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(code))
            .map(|(_, rate)| *rate)
    }

    /// Returns the lookup timeout as a `Duration`.
    #[must_use]
    pub const fn lookup_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later overriding earlier: `config/default`, `config/{RUN_MODE}`,
    /// then `TALLY__`-prefixed environment variables (`TALLY__DATABASE__URL`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
