//! Property tests for the posting engine.
//!
//! Random sequences of postings and drafts against the in-memory store must
//! keep the books balanced and every stored balance derivable from entries.

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::*;
use crate::testing::{date, open_account};

const ACCOUNTS: usize = 4;

#[derive(Debug, Clone)]
enum Step {
    Post { debit: usize, credit: usize, cents: i64 },
    Draft { debit: usize, credit: usize, cents: i64 },
    Unbalanced { debit: usize, credit: usize, cents: i64 },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    let legs = (0..ACCOUNTS, 0..ACCOUNTS, 1i64..1_000_000);
    prop_oneof![
        3 => legs.clone().prop_map(|(debit, credit, cents)| Step::Post { debit, credit, cents }),
        1 => legs.clone().prop_map(|(debit, credit, cents)| Step::Draft { debit, credit, cents }),
        1 => legs.prop_map(|(debit, credit, cents)| Step::Unbalanced { debit, credit, cents }),
    ]
}

fn input(
    accounts: &[AccountId],
    debit: usize,
    credit: usize,
    debit_cents: i64,
    credit_cents: i64,
) -> PostTransactionInput {
    PostTransactionInput::complex(
        "generated",
        TransactionType::Transfer,
        date(),
        TransactionLinks::default(),
        vec![
            EntryInput::debit(accounts[debit], Decimal::new(debit_cents, 2)),
            EntryInput::credit(accounts[credit], Decimal::new(credit_cents, 2)),
        ],
    )
}

/// Runs the steps and returns the completed-posting count and final audits.
fn run(steps: Vec<Step>) -> (usize, Vec<BalanceAudit>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let store = Arc::new(MemoryLedgerStore::new());
        let accounts: Vec<AccountId> = (0..ACCOUNTS)
            .map(|i| open_account(&store, &format!("Account {i}"), AccountKind::Bank))
            .collect();
        let engine = LedgerEngine::new(Arc::clone(&store));
        let reader = LedgerReader::new(Arc::clone(&store));

        let mut completed = 0;
        for step in steps {
            match step {
                Step::Post { debit, credit, cents } => {
                    engine
                        .post_transaction(input(&accounts, debit, credit, cents, cents))
                        .await
                        .unwrap();
                    completed += 1;
                }
                Step::Draft { debit, credit, cents } => {
                    engine
                        .save_draft(input(&accounts, debit, credit, cents, cents))
                        .await
                        .unwrap();
                }
                Step::Unbalanced { debit, credit, cents } => {
                    let result = engine
                        .post_transaction(input(&accounts, debit, credit, cents, cents + 1))
                        .await;
                    assert!(matches!(result, Err(LedgerError::Unbalanced { .. })));
                }
            }
        }

        let mut audits = Vec::with_capacity(ACCOUNTS);
        for id in accounts {
            audits.push(reader.audit_balance(id).await.unwrap());
        }
        (completed, audits)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Balances across all accounts always sum to zero.
    #[test]
    fn prop_books_stay_balanced(steps in prop::collection::vec(step_strategy(), 0..30)) {
        let (_, audits) = run(steps);
        let total: Decimal = audits.iter().map(|audit| audit.recorded).sum();
        prop_assert_eq!(total, Decimal::ZERO);
    }

    /// Every stored balance equals the signed sum of its completed entries.
    #[test]
    fn prop_balances_match_entries(steps in prop::collection::vec(step_strategy(), 0..30)) {
        let (_, audits) = run(steps);
        for audit in audits {
            prop_assert!(audit.is_consistent(), "{audit:?}");
        }
    }

    /// Drafts and rejected postings never move money.
    #[test]
    fn prop_only_completed_postings_move_balances(
        steps in prop::collection::vec(step_strategy(), 1..20)
    ) {
        let moved_nothing = steps.iter().all(|step| !matches!(step, Step::Post { .. }));
        let (completed, audits) = run(steps);
        if moved_nothing {
            prop_assert_eq!(completed, 0);
            for audit in audits {
                prop_assert_eq!(audit.recorded, Decimal::ZERO);
            }
        }
    }
}
