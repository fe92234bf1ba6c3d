//! Business rule validation for ledger operations.
//!
//! Everything here is pure and runs before a unit of work is opened.

use rust_decimal::Decimal;

use super::entry::EntryInput;
use super::error::LedgerError;
use super::transaction::TransactionStatus;
use super::types::EntryTotals;

/// Decimal places kept for every stored amount and balance.
pub const MAX_AMOUNT_SCALE: u32 = 8;

/// Rejects a value that would lose digits when stored at `max_scale`.
/// Trailing zeros do not count.
///
/// # Errors
///
/// Returns `ExcessivePrecision` for a value with too many decimal places.
pub fn check_scale(value: Decimal, max_scale: u32) -> Result<(), LedgerError> {
    if value.normalize().scale() > max_scale {
        return Err(LedgerError::ExcessivePrecision { value, max_scale });
    }
    Ok(())
}

/// Validates the shape of a posting request.
///
/// Checks, in order: at least two legs, every amount strictly positive and
/// within `MAX_AMOUNT_SCALE` decimal places, totals representable, debits
/// equal credits exactly, declared total equals the debit total.
///
/// # Errors
///
/// Returns the first rule that fails.
pub fn validate_entries(
    entries: &[EntryInput],
    declared_total: Decimal,
) -> Result<EntryTotals, LedgerError> {
    if entries.len() < 2 {
        return Err(LedgerError::InsufficientEntries);
    }

    if let Some(entry) = entries.iter().find(|entry| entry.amount <= Decimal::ZERO) {
        return Err(LedgerError::NonPositiveAmount(entry.amount));
    }

    for entry in entries {
        check_scale(entry.amount, MAX_AMOUNT_SCALE)?;
    }

    let totals = EntryTotals::of(entries)?;
    if !totals.is_balanced() {
        return Err(LedgerError::Unbalanced {
            debit: totals.debit,
            credit: totals.credit,
        });
    }

    if declared_total != totals.debit {
        return Err(LedgerError::AmountMismatch {
            declared: declared_total,
            debit: totals.debit,
        });
    }

    Ok(totals)
}

/// Validates a lifecycle move.
///
/// # Errors
///
/// Returns `InvalidStatusTransition` if the lifecycle forbids it.
pub fn validate_transition(
    from: TransactionStatus,
    to: TransactionStatus,
) -> Result<(), LedgerError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(LedgerError::InvalidStatusTransition { from, to })
    }
}
