//! External transaction references (blockchain hashes).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the external ledger knows about a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTransfer {
    /// Whether the external ledger considers the transfer final.
    pub confirmed: bool,
    /// Block the transfer landed in.
    pub block_number: Option<i64>,
    /// Network fee, in the transferred currency.
    pub fee: Option<Decimal>,
    /// Sending address.
    pub from_address: Option<String>,
    /// Receiving address.
    pub to_address: Option<String>,
    /// When the transfer happened.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Errors from a reference validator.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// Upstream call failed.
    #[error("Reference lookup failed: {0}")]
    Request(String),

    /// Upstream answered with something unreadable.
    #[error("Unreadable reference lookup response: {0}")]
    Malformed(String),
}

/// Why an external reference was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceRejection {
    /// Empty or whitespace-only reference.
    #[error("Reference is blank")]
    Blank,

    /// The external ledger does not know the reference.
    #[error("Reference is unknown")]
    Unknown,

    /// Known but not yet final.
    #[error("Reference is not confirmed")]
    Unconfirmed(ExternalTransfer),

    /// The validator failed.
    #[error("{0}")]
    LookupFailed(String),

    /// The validator did not answer in time.
    #[error("Reference lookup timed out")]
    TimedOut,
}

/// Looks up external references.
#[async_trait]
pub trait ReferenceValidator: Send + Sync {
    /// Returns the transfer behind `reference`, or `None` if it is unknown.
    async fn lookup(&self, reference: &str) -> Result<Option<ExternalTransfer>, ReferenceError>;
}
