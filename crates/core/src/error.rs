//! Mapping of core errors onto the shared application error.

use tally_shared::AppError;

use crate::ledger::LedgerError;

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::NotFound { .. } | LedgerError::TransactionNotFound(_) => {
                Self::NotFound(message)
            }
            LedgerError::InsufficientEntries
            | LedgerError::NonPositiveAmount(_)
            | LedgerError::ExcessivePrecision { .. }
            | LedgerError::AmountOverflow
            | LedgerError::UnsupportedCurrency(_) => Self::Validation(message),
            LedgerError::Unbalanced { .. }
            | LedgerError::AmountMismatch { .. }
            | LedgerError::AccountInactive(_)
            | LedgerError::CanOnlyDeleteDraft
            | LedgerError::InvalidStatusTransition { .. }
            | LedgerError::InvalidExternalReference(_) => Self::BusinessRule(message),
            LedgerError::RateUnavailable(_) => Self::ExternalService(message),
            LedgerError::StorageConflict(_) => Self::Conflict(message),
            LedgerError::Storage(_) => Self::Database(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_shared::types::TransactionId;

    #[test]
    fn test_ledger_error_maps_to_app_error() {
        let app: AppError = LedgerError::Unbalanced {
            debit: dec!(150.00),
            credit: dec!(140.00),
        }
        .into();
        assert!(matches!(app, AppError::BusinessRule(_)));
        assert_eq!(app.status_code(), 422);

        let app: AppError = LedgerError::TransactionNotFound(TransactionId::new()).into();
        assert_eq!(app.status_code(), 404);
    }

    #[test]
    fn test_retryability_survives_mapping() {
        let app: AppError = LedgerError::StorageConflict("busy".into()).into();
        assert!(app.is_retryable());

        let app: AppError = LedgerError::Storage("down".into()).into();
        assert!(!app.is_retryable());
    }
}
