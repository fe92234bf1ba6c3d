//! Ledger error types for validation, reference, state and storage errors.
//!
//! Validation and reference errors are raised before any write. Only
//! `StorageConflict` is worth retrying.

use rust_decimal::Decimal;
use tally_shared::types::{AccountId, TransactionId};
use thiserror::Error;
use uuid::Uuid;

use super::transaction::TransactionStatus;
use super::types::ReferenceKind;

/// Errors that can occur during ledger and conversion operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Transaction must have at least 2 entries.
    #[error("Transaction must have at least 2 entries")]
    InsufficientEntries,

    /// Entry amount must be strictly positive.
    #[error("Entry amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Transaction is not balanced (debits != credits).
    #[error("Transaction is not balanced. Debit: {debit}, Credit: {credit}")]
    Unbalanced {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Amount carries more decimal places than the ledger stores.
    #[error("Amount {value} has more than {max_scale} decimal places")]
    ExcessivePrecision {
        /// The offending amount.
        value: Decimal,
        /// Largest scale the ledger keeps.
        max_scale: u32,
    },

    /// Summing or converting amounts left the representable range.
    #[error("Amount arithmetic overflowed")]
    AmountOverflow,

    /// Declared total does not match the entries.
    #[error("Declared total {declared} does not match debit total {debit}")]
    AmountMismatch {
        /// Total declared on the transaction.
        declared: Decimal,
        /// Sum of debit entries.
        debit: Decimal,
    },

    // ========== Reference Errors ==========
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of record was referenced.
        kind: ReferenceKind,
        /// The missing id.
        id: Uuid,
    },

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Account is inactive and cannot be posted to.
    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    // ========== Transaction State Errors ==========
    /// Can only delete draft transactions.
    #[error("Can only delete draft transactions")]
    CanOnlyDeleteDraft,

    /// Status change not allowed by the lifecycle.
    #[error("Cannot move transaction from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: TransactionStatus,
        /// Requested status.
        to: TransactionStatus,
    },

    // ========== Conversion Errors ==========
    /// Currency has no conversion support.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// External reference is unknown, unconfirmed or could not be checked.
    #[error("Invalid or unconfirmed external transaction: {0}")]
    InvalidExternalReference(String),

    /// Live rate lookup failed. Absorbed by the conversion overlay.
    #[error("Rate unavailable for {0}")]
    RateUnavailable(String),

    // ========== Storage Errors ==========
    /// Concurrent write conflict; the operation may be retried.
    #[error("Storage conflict, please retry: {0}")]
    StorageConflict(String),

    /// Any other storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Shorthand for a missing account.
    #[must_use]
    pub fn account_not_found(id: AccountId) -> Self {
        Self::NotFound {
            kind: ReferenceKind::Account,
            id: id.into_inner(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientEntries => "INSUFFICIENT_ENTRIES",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::Unbalanced { .. } => "UNBALANCED_TRANSACTION",
            Self::ExcessivePrecision { .. } => "EXCESSIVE_PRECISION",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::CanOnlyDeleteDraft => "CAN_ONLY_DELETE_DRAFT",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            Self::InvalidExternalReference(_) => "INVALID_EXTERNAL_REFERENCE",
            Self::RateUnavailable(_) => "RATE_UNAVAILABLE",
            Self::StorageConflict(_) => "STORAGE_CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation and state errors
            Self::InsufficientEntries
            | Self::NonPositiveAmount(_)
            | Self::Unbalanced { .. }
            | Self::ExcessivePrecision { .. }
            | Self::AmountOverflow
            | Self::AmountMismatch { .. }
            | Self::AccountInactive(_)
            | Self::CanOnlyDeleteDraft
            | Self::InvalidStatusTransition { .. }
            | Self::UnsupportedCurrency(_)
            | Self::InvalidExternalReference(_) => 400,

            // 404 Not Found
            Self::NotFound { .. } | Self::TransactionNotFound(_) => 404,

            // 409 Conflict - concurrency errors
            Self::StorageConflict(_) => 409,

            // 503 - upstream lookup
            Self::RateUnavailable(_) => 503,

            // 500 Internal Server Error
            Self::Storage(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageConflict(_))
    }
}
