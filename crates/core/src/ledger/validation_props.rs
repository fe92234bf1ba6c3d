//! Property-based tests for posting validation rules.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::entry::{Direction, EntryInput};
use super::error::LedgerError;
use super::validation::validate_entries;

/// Strategy to generate a valid positive amount (> 0).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    // 0.01 to 1,000,000.00
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a zero or negative amount.
fn non_positive_amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(-cents, 2))
}

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Debit), Just(Direction::Credit)]
}

fn leg(direction: Direction, amount: Decimal) -> EntryInput {
    EntryInput {
        account_id: AccountId::new(),
        amount,
        direction,
        note: None,
    }
}

fn opposite(direction: Direction) -> Direction {
    match direction {
        Direction::Debit => Direction::Credit,
        Direction::Credit => Direction::Debit,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any non-positive leg is rejected, whatever else is in the set.
    #[test]
    fn prop_non_positive_amount_rejected(
        direction in direction_strategy(),
        bad in non_positive_amount(),
        other in positive_amount(),
    ) {
        let entries = vec![leg(direction, bad), leg(opposite(direction), other)];
        let result = validate_entries(&entries, other);
        prop_assert!(
            matches!(result, Err(LedgerError::NonPositiveAmount(amount)) if amount == bad),
            "Non-positive amount should be rejected, got: {:?}",
            result
        );
    }

    /// Fewer than two legs never validates.
    #[test]
    fn prop_single_leg_rejected(
        direction in direction_strategy(),
        amount in positive_amount(),
    ) {
        let result = validate_entries(&[leg(direction, amount)], amount);
        prop_assert!(matches!(result, Err(LedgerError::InsufficientEntries)));
    }

    /// Debits split across many legs balance against one credit.
    #[test]
    fn prop_split_debits_accepted(
        amounts in prop::collection::vec(positive_amount(), 1..8),
    ) {
        let total: Decimal = amounts.iter().copied().sum();
        let mut entries: Vec<_> = amounts.iter().map(|a| leg(Direction::Debit, *a)).collect();
        entries.push(leg(Direction::Credit, total));

        let totals = validate_entries(&entries, total);
        prop_assert!(totals.is_ok(), "Balanced split should pass: {:?}", totals);
        let totals = totals.unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
    }

    /// Any drift between the sides is reported with both totals.
    #[test]
    fn prop_unbalanced_reports_totals(
        amount in positive_amount(),
        drift in positive_amount(),
    ) {
        let entries = vec![
            leg(Direction::Debit, amount + drift),
            leg(Direction::Credit, amount),
        ];
        let result = validate_entries(&entries, amount + drift);
        prop_assert!(
            matches!(
                result,
                Err(LedgerError::Unbalanced { debit, credit })
                    if debit == amount + drift && credit == amount
            ),
            "Expected Unbalanced, got: {:?}",
            result
        );
    }
}
