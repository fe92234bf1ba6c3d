//! Foreign-currency (crypto) overlay.
//!
//! - `currency` - Supported currencies and wallet address checks
//! - `rate` - Rate source seam and base-currency conversion
//! - `reference` - External reference validator seam
//! - `detail` - Crypto detail rows and their store
//! - `service` - The overlay itself

pub mod currency;
pub mod detail;
pub mod rate;
pub mod reference;
pub mod service;


pub use currency::{
    AssetType, CryptoCurrencyInfo, TRON_NETWORK, WalletAddressError, supported_currencies,
    validate_wallet_address,
};
pub use detail::{CryptoDetailStore, CryptoTransactionDetail};
pub use rate::{
    AppliedRate, MAX_RATE_SCALE, RateError, RateOrigin, RateSource, convert_to_base,
    normalize_rate,
};
pub use reference::{ExternalTransfer, ReferenceError, ReferenceRejection, ReferenceValidator};
pub use service::{ConversionService, ForeignKind, ForeignPosting, ForeignPostingInput};
