//! Supported foreign currencies and wallet address checks.

use serde::Serialize;
use tally_shared::types::CurrencyCode;
use thiserror::Error;

/// Network name shared by every supported currency.
pub const TRON_NETWORK: &str = "TRON";

/// Whether a currency is a chain's native coin or a token on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// Native coin of the network.
    Native,
    /// Token issued by a contract.
    Token,
}

/// A currency the conversion overlay can post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CryptoCurrencyInfo {
    /// Ticker.
    pub code: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Network the currency lives on.
    pub network: &'static str,
    /// Smallest-unit decimals on chain.
    pub decimals: u32,
    /// Native coin or token.
    pub asset_type: AssetType,
    /// Token contract, if any.
    pub contract_address: Option<&'static str>,
}

static SUPPORTED: [CryptoCurrencyInfo; 2] = [
    CryptoCurrencyInfo {
        code: "TRX",
        name: "TRON",
        network: TRON_NETWORK,
        decimals: 6,
        asset_type: AssetType::Native,
        contract_address: None,
    },
    CryptoCurrencyInfo {
        code: "USDT",
        name: "Tether USD",
        network: TRON_NETWORK,
        decimals: 6,
        asset_type: AssetType::Token,
        contract_address: Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"),
    },
];

/// Every supported currency.
#[must_use]
pub fn supported_currencies() -> &'static [CryptoCurrencyInfo] {
    &SUPPORTED
}

/// Finds a supported currency by code.
#[must_use]
pub fn find_supported(code: &CurrencyCode) -> Option<&'static CryptoCurrencyInfo> {
    supported_currencies()
        .iter()
        .find(|info| info.code == code.as_str())
}

/// Why a wallet address was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletAddressError {
    /// No validation rules for this network.
    #[error("Network {0} not supported")]
    UnsupportedNetwork(String),

    /// Address does not match the network's format.
    #[error("Invalid {0} address format")]
    InvalidFormat(&'static str),
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Checks an address against the network's format.
///
/// TRON addresses are 34 base58 characters starting with `T`.
///
/// # Errors
///
/// Returns the reason the address was rejected.
pub fn validate_wallet_address(address: &str, network: &str) -> Result<(), WalletAddressError> {
    if !network.eq_ignore_ascii_case(TRON_NETWORK) {
        return Err(WalletAddressError::UnsupportedNetwork(network.to_string()));
    }

    let well_formed = address.len() == 34
        && address.starts_with('T')
        && address.chars().all(|c| BASE58_ALPHABET.contains(c));
    if well_formed {
        Ok(())
    } else {
        Err(WalletAddressError::InvalidFormat(TRON_NETWORK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_find_supported() {
        let trx = find_supported(&CurrencyCode::parse("trx").unwrap()).unwrap();
        assert_eq!(trx.network, TRON_NETWORK);
        assert!(find_supported(&CurrencyCode::parse("BTC").unwrap()).is_none());
    }

    #[rstest]
    #[case("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "tron", Ok(()))]
    #[case("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6", "tron", Err(WalletAddressError::InvalidFormat("TRON")))]
    #[case("AR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "TRON", Err(WalletAddressError::InvalidFormat("TRON")))]
    #[case("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj0t", "TRON", Err(WalletAddressError::InvalidFormat("TRON")))]
    #[case("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "ethereum", Err(WalletAddressError::UnsupportedNetwork("ethereum".into())))]
    fn test_validate_wallet_address(
        #[case] address: &str,
        #[case] network: &str,
        #[case] expected: Result<(), WalletAddressError>,
    ) {
        assert_eq!(validate_wallet_address(address, network), expected);
    }
}
