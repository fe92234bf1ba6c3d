//! Engine behaviour against the in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_shared::types::{AccountId, PageRequest, ProjectId};

use super::*;
use crate::testing::{FlakyStore, balance, date, open_account};

struct Books {
    store: Arc<MemoryLedgerStore>,
    engine: LedgerEngine<MemoryLedgerStore>,
    bank: AccountId,
    income: AccountId,
    expense: AccountId,
    savings: AccountId,
}

fn books() -> Books {
    let store = Arc::new(MemoryLedgerStore::new());
    let bank = open_account(&store, "Operating", AccountKind::Bank);
    let income = open_account(&store, "Client revenue", AccountKind::Investment);
    let expense = open_account(&store, "Hosting", AccountKind::Cash);
    let savings = open_account(&store, "Savings", AccountKind::Bank);
    Books {
        engine: LedgerEngine::new(Arc::clone(&store)),
        store,
        bank,
        income,
        expense,
        savings,
    }
}

async fn assert_untouched(store: &MemoryLedgerStore, accounts: &[AccountId]) {
    for id in accounts {
        assert_eq!(balance(store, *id).await, Decimal::ZERO);
        assert!(store.find_completed_entries(*id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_income_posts_two_entries() {
    let b = books();

    let posted = b
        .engine
        .post_income(b.bank, b.income, SimplePosting::new("Invoice 42", dec!(100.00), date()))
        .await
        .unwrap();

    assert_eq!(posted.transaction.status, TransactionStatus::Completed);
    assert_eq!(posted.transaction.transaction_type, TransactionType::Income);
    assert_eq!(posted.entries.len(), 2);
    assert_eq!(posted.entries[0].account_id, b.bank);
    assert_eq!(posted.entries[0].direction, Direction::Debit);
    assert_eq!(posted.entries[0].amount, dec!(100.00));
    assert_eq!(posted.entries[1].account_id, b.income);
    assert_eq!(posted.entries[1].direction, Direction::Credit);

    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(100.00));
    assert_eq!(balance(b.store.as_ref(), b.income).await, dec!(-100.00));
    assert_eq!(posted.account(b.bank).unwrap().balance, dec!(100.00));
}

#[tokio::test]
async fn test_expense_and_transfer_balances() {
    let b = books();
    b.engine
        .post_income(b.bank, b.income, SimplePosting::new("Seed", dec!(500), date()))
        .await
        .unwrap();
    b.engine
        .post_expense(b.expense, b.bank, SimplePosting::new("Servers", dec!(120.50), date()))
        .await
        .unwrap();
    let transfer = b
        .engine
        .post_transfer(b.bank, b.savings, SimplePosting::new("Reserve", dec!(200), date()))
        .await
        .unwrap();

    assert_eq!(transfer.transaction.transaction_type, TransactionType::Transfer);
    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(179.50));
    assert_eq!(balance(b.store.as_ref(), b.expense).await, dec!(120.50));
    assert_eq!(balance(b.store.as_ref(), b.savings).await, dec!(200));

    let mut total = Decimal::ZERO;
    for id in [b.bank, b.income, b.expense, b.savings] {
        total += balance(b.store.as_ref(), id).await;
    }
    assert_eq!(total, Decimal::ZERO);
}

#[tokio::test]
async fn test_unbalanced_complex_rejected_without_writes() {
    let b = books();

    let err = b
        .engine
        .post_complex(
            "Split",
            TransactionType::Expense,
            date(),
            TransactionLinks::default(),
            vec![
                EntryInput::debit(b.expense, dec!(100.00)),
                EntryInput::debit(b.savings, dec!(50.00)),
                EntryInput::credit(b.bank, dec!(140.00)),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Unbalanced { debit, credit } if debit == dec!(150.00) && credit == dec!(140.00)
    ));
    assert_untouched(&b.store, &[b.bank, b.expense, b.savings]).await;
}

#[tokio::test]
async fn test_overflowing_legs_rejected_without_writes() {
    let b = books();

    let err = b
        .engine
        .post_complex(
            "Too big",
            TransactionType::Transfer,
            date(),
            TransactionLinks::default(),
            vec![
                EntryInput::debit(b.expense, Decimal::MAX),
                EntryInput::debit(b.savings, Decimal::MAX),
                EntryInput::credit(b.bank, Decimal::MAX),
                EntryInput::credit(b.income, Decimal::MAX),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::AmountOverflow));
    assert_untouched(&b.store, &[b.bank, b.income, b.expense, b.savings]).await;
}

#[tokio::test]
async fn test_balance_overflow_rolls_back() {
    let b = books();
    b.engine
        .post_income(b.bank, b.income, SimplePosting::new("Whale", Decimal::MAX, date()))
        .await
        .unwrap();

    let err = b
        .engine
        .post_income(b.bank, b.savings, SimplePosting::new("One more", dec!(1), date()))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::AmountOverflow));
    assert_eq!(balance(b.store.as_ref(), b.bank).await, Decimal::MAX);
    assert_untouched(&b.store, &[b.savings]).await;
}

#[tokio::test]
async fn test_amounts_beyond_stored_precision_rejected() {
    let b = books();

    let err = b
        .engine
        .post_complex(
            "Dust",
            TransactionType::Expense,
            date(),
            TransactionLinks::default(),
            vec![
                EntryInput::debit(b.expense, dec!(1.000000004)),
                EntryInput::debit(b.savings, dec!(1.000000004)),
                EntryInput::credit(b.bank, dec!(2.000000008)),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::ExcessivePrecision { max_scale: 8, .. }));
    assert_untouched(&b.store, &[b.bank, b.expense, b.savings]).await;
}

#[tokio::test]
async fn test_balanced_complex_split() {
    let b = books();

    let posted = b
        .engine
        .post_complex(
            "Split",
            TransactionType::Expense,
            date(),
            TransactionLinks::default(),
            vec![
                EntryInput::debit(b.expense, dec!(100.00)).with_note("hosting"),
                EntryInput::debit(b.savings, dec!(40.00)),
                EntryInput::credit(b.bank, dec!(140.00)),
            ],
        )
        .await
        .unwrap();

    assert_eq!(posted.transaction.total_amount, dec!(140.00));
    assert_eq!(posted.accounts.len(), 3);
    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(-140.00));
}

#[tokio::test]
async fn test_single_leg_rejected() {
    let b = books();
    let err = b
        .engine
        .post_complex(
            "Half",
            TransactionType::Income,
            date(),
            TransactionLinks::default(),
            vec![EntryInput::debit(b.bank, dec!(10))],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientEntries));
}

#[tokio::test]
async fn test_links_checked_before_accounts() {
    let b = books();
    let project = ProjectId::new();
    let missing_account = AccountId::new();

    let posting = SimplePosting::new("Linked", dec!(10), date()).with_links(TransactionLinks {
        project_id: Some(project),
        ..TransactionLinks::default()
    });
    let err = b
        .engine
        .post_income(missing_account, b.income, posting.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound { kind: ReferenceKind::Project, id } if id == project.into_inner()
    ));

    b.store
        .register_reference(ReferenceKind::Project, project.into_inner())
        .unwrap();
    let err = b
        .engine
        .post_income(missing_account, b.income, posting.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound { kind: ReferenceKind::Account, id } if id == missing_account.into_inner()
    ));

    let posted = b.engine.post_income(b.bank, b.income, posting).await.unwrap();
    assert_eq!(posted.transaction.links.project_id, Some(project));
    assert_untouched(&b.store, &[b.expense]).await;
}

#[tokio::test]
async fn test_inactive_account_rejected() {
    let b = books();
    b.store.deactivate_account(b.income).unwrap();

    let err = b
        .engine
        .post_income(b.bank, b.income, SimplePosting::new("Late", dec!(1), date()))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountInactive(id) if id == b.income));
    assert_untouched(&b.store, &[b.bank, b.income]).await;
}

#[tokio::test]
async fn test_declared_total_must_match() {
    let b = books();
    let mut input =
        PostTransactionInput::income(b.bank, b.income, SimplePosting::new("x", dec!(10), date()));
    input.total_amount = dec!(12);

    let err = b.engine.post_transaction(input).await.unwrap_err();
    assert!(matches!(err, LedgerError::AmountMismatch { .. }));
}

#[tokio::test]
async fn test_delete_draft_leaves_balances() {
    let b = books();
    let reader = LedgerReader::new(Arc::clone(&b.store));

    let draft = b
        .engine
        .save_draft(PostTransactionInput::income(
            b.bank,
            b.income,
            SimplePosting::new("Maybe", dec!(75), date()),
        ))
        .await
        .unwrap();
    assert_eq!(draft.transaction.status, TransactionStatus::Draft);
    assert!(draft.accounts.is_empty());
    assert_untouched(&b.store, &[b.bank, b.income]).await;

    b.engine.delete_transaction(draft.transaction.id).await.unwrap();

    assert!(matches!(
        reader.get_with_entries(draft.transaction.id).await,
        Err(LedgerError::TransactionNotFound(_))
    ));
    assert!(b.store.find_entries(draft.transaction.id).await.unwrap().is_empty());
    assert_untouched(&b.store, &[b.bank, b.income]).await;
}

#[tokio::test]
async fn test_delete_completed_rejected() {
    let b = books();
    let posted = b
        .engine
        .post_income(b.bank, b.income, SimplePosting::new("Final", dec!(30), date()))
        .await
        .unwrap();

    let err = b
        .engine
        .delete_transaction(posted.transaction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CanOnlyDeleteDraft));
    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(30));
    assert_eq!(b.store.find_entries(posted.transaction.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_missing_transaction() {
    let b = books();
    let missing = tally_shared::types::TransactionId::new();
    let err = b.engine.delete_transaction(missing).await.unwrap_err();
    assert!(matches!(err, LedgerError::TransactionNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_draft_submit_complete_lifecycle() {
    let b = books();
    let draft = b
        .engine
        .save_draft(PostTransactionInput::expense(
            b.expense,
            b.bank,
            SimplePosting::new("Laptop", dec!(999.99), date()),
        ))
        .await
        .unwrap();
    let id = draft.transaction.id;

    let pending = b.engine.submit_draft(id).await.unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert_untouched(&b.store, &[b.bank, b.expense]).await;

    let completed = b.engine.complete_transaction(id).await.unwrap();
    assert_eq!(completed.transaction.status, TransactionStatus::Completed);
    assert_eq!(balance(b.store.as_ref(), b.expense).await, dec!(999.99));
    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(-999.99));

    let err = b.engine.complete_transaction(id).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidStatusTransition {
            from: TransactionStatus::Completed,
            to: TransactionStatus::Completed
        }
    ));
    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(-999.99));

    let err = b.engine.cancel_transaction(id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidStatusTransition { .. }));
}

#[tokio::test]
async fn test_cancelled_draft_never_posts() {
    let b = books();
    let draft = b
        .engine
        .save_draft(PostTransactionInput::income(
            b.bank,
            b.income,
            SimplePosting::new("Dropped", dec!(5), date()),
        ))
        .await
        .unwrap();
    let id = draft.transaction.id;

    let cancelled = b.engine.cancel_transaction(id).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);

    assert!(matches!(
        b.engine.complete_transaction(id).await,
        Err(LedgerError::InvalidStatusTransition { .. })
    ));
    assert!(matches!(
        b.engine.delete_transaction(id).await,
        Err(LedgerError::CanOnlyDeleteDraft)
    ));
    assert_untouched(&b.store, &[b.bank, b.income]).await;
}

#[tokio::test]
async fn test_complete_rechecks_accounts() {
    let b = books();
    let draft = b
        .engine
        .save_draft(PostTransactionInput::income(
            b.bank,
            b.income,
            SimplePosting::new("Stale", dec!(5), date()),
        ))
        .await
        .unwrap();
    b.store.deactivate_account(b.bank).unwrap();

    let err = b
        .engine
        .complete_transaction(draft.transaction.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountInactive(id) if id == b.bank));
    let stored = b
        .store
        .find_transaction(draft.transaction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TransactionStatus::Draft);
}

#[tokio::test]
async fn test_conflicts_retried_then_committed_once() {
    let memory = MemoryLedgerStore::new();
    let bank = open_account(&memory, "Operating", AccountKind::Bank);
    let income = open_account(&memory, "Revenue", AccountKind::Investment);
    let store = Arc::new(FlakyStore::new(memory).with_conflicts(2));
    let engine = LedgerEngine::new(Arc::clone(&store)).with_max_commit_retries(3);

    engine
        .post_income(bank, income, SimplePosting::new("Retry", dec!(10), date()))
        .await
        .unwrap();

    assert_eq!(store.remaining_conflicts(), 0);
    assert_eq!(balance(store.as_ref(), bank).await, dec!(10));
    assert_eq!(store.find_completed_entries(bank).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_conflicts_exhaust_retry_budget() {
    let memory = MemoryLedgerStore::new();
    let bank = open_account(&memory, "Operating", AccountKind::Bank);
    let income = open_account(&memory, "Revenue", AccountKind::Investment);
    let store = Arc::new(FlakyStore::new(memory).with_conflicts(10));
    let engine = LedgerEngine::new(Arc::clone(&store)).with_max_commit_retries(3);

    let err = engine
        .post_income(bank, income, SimplePosting::new("Busy", dec!(10), date()))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(store.remaining_conflicts(), 6);
    assert_eq!(balance(store.as_ref(), bank).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_storage_failure_mid_commit_rolls_back() {
    let memory = MemoryLedgerStore::new();
    let bank = open_account(&memory, "Operating", AccountKind::Bank);
    let income = open_account(&memory, "Revenue", AccountKind::Investment);
    // Whichever account sorts first gets its delta staged before the failure.
    let store = Arc::new(FlakyStore::new(memory).failing_delta_for(bank.max(income)));
    let engine = LedgerEngine::new(Arc::clone(&store));

    let err = engine
        .post_income(bank, income, SimplePosting::new("Broken", dec!(10), date()))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Storage(_)));
    for id in [bank, income] {
        assert_eq!(balance(store.as_ref(), id).await, Decimal::ZERO);
        assert!(store.find_completed_entries(id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_read_model_joins_accounts() {
    let b = books();
    let posted = b
        .engine
        .post_expense(b.expense, b.bank, SimplePosting::new("Coffee", dec!(4.20), date()))
        .await
        .unwrap();
    let reader = LedgerReader::new(Arc::clone(&b.store));

    let view = reader.get_with_entries(posted.transaction.id).await.unwrap();
    assert_eq!(view.transaction.id, posted.transaction.id);
    assert_eq!(view.entries.len(), 2);
    assert_eq!(view.entries[0].account_name, "Hosting");
    assert_eq!(view.entries[1].account_name, "Operating");
    assert_eq!(view.entries[1].account_kind, AccountKind::Bank);

    let audit = reader.audit_balance(b.bank).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.derived, dec!(-4.20));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_disjoint_postings() {
    let b = books();
    let (bank, income, expense, savings) = (b.bank, b.income, b.expense, b.savings);

    let left = tokio::spawn({
        let engine = b.engine.clone();
        async move {
            engine
                .post_income(bank, income, SimplePosting::new("A", dec!(10), date()))
                .await
        }
    });
    let right = tokio::spawn({
        let engine = b.engine.clone();
        async move {
            engine
                .post_expense(expense, savings, SimplePosting::new("B", dec!(7), date()))
                .await
        }
    });
    left.await.unwrap().unwrap();
    right.await.unwrap().unwrap();

    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(10));
    assert_eq!(balance(b.store.as_ref(), b.income).await, dec!(-10));
    assert_eq!(balance(b.store.as_ref(), b.expense).await, dec!(7));
    assert_eq!(balance(b.store.as_ref(), b.savings).await, dec!(-7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_draft_lifecycle_on_spawned_tasks() {
    let b = books();
    let input =
        PostTransactionInput::income(b.bank, b.income, SimplePosting::new("Later", dec!(9), date()));

    let draft = tokio::spawn({
        let engine = b.engine.clone();
        async move { engine.save_draft(input).await }
    })
    .await
    .unwrap()
    .unwrap();
    let id = draft.transaction.id;

    let completed = tokio::spawn({
        let engine = b.engine.clone();
        async move { engine.complete_transaction(id).await }
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(completed.transaction.status, TransactionStatus::Completed);
    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(9));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overlapping_postings_lose_nothing() {
    let b = books();
    let engine = b.engine.clone().with_max_commit_retries(10_000);

    let sources: Vec<AccountId> = (0..8)
        .map(|i| open_account(&b.store, &format!("Client {i}"), AccountKind::Investment))
        .collect();

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let engine = engine.clone();
            let source = sources[i % sources.len()];
            let bank = b.bank;
            tokio::spawn(async move {
                engine
                    .post_income(bank, source, SimplePosting::new("Payment", dec!(1.25), date()))
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    assert_eq!(balance(b.store.as_ref(), b.bank).await, dec!(50.00));
    let reader = LedgerReader::new(Arc::clone(&b.store));
    assert!(reader.audit_balance(b.bank).await.unwrap().is_consistent());
    for source in sources {
        assert_eq!(balance(b.store.as_ref(), source).await, dec!(-6.25));
    }
}

fn on(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, day).unwrap()
}

#[tokio::test]
async fn test_list_transactions_filters_and_pages() {
    let b = books();
    let project = ProjectId::new();
    b.store
        .register_reference(ReferenceKind::Project, project.into_inner())
        .unwrap();
    let linked = TransactionLinks {
        project_id: Some(project),
        ..TransactionLinks::default()
    };

    for day in 1..=5 {
        let posting = SimplePosting::new(format!("Invoice {day}"), dec!(10), on(day));
        b.engine.post_income(b.bank, b.income, posting).await.unwrap();
    }
    b.engine
        .post_expense(
            b.expense,
            b.bank,
            SimplePosting::new("Servers", dec!(3), on(2)).with_links(linked),
        )
        .await
        .unwrap();
    b.engine
        .save_draft(PostTransactionInput::expense(
            b.expense,
            b.bank,
            SimplePosting::new("Pending invoice", dec!(8), on(9)).with_links(linked),
        ))
        .await
        .unwrap();

    let reader = LedgerReader::new(Arc::clone(&b.store));

    let everything = reader
        .list_transactions(&TransactionFilter::default(), &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(everything.meta.total, 7);
    assert_eq!(everything.data[0].description, "Pending invoice");
    assert!(
        everything
            .data
            .windows(2)
            .all(|pair| pair[0].transaction_date >= pair[1].transaction_date)
    );

    let incomes = TransactionFilter {
        transaction_type: Some(TransactionType::Income),
        ..TransactionFilter::default()
    };
    let second_page = reader
        .list_transactions(&incomes, &PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(second_page.meta.total, 5);
    assert_eq!(second_page.meta.total_pages, 3);
    let descriptions: Vec<&str> = second_page
        .data
        .iter()
        .map(|tx| tx.description.as_str())
        .collect();
    assert_eq!(descriptions, ["Invoice 3", "Invoice 2"]);

    let completed_for_project = TransactionFilter {
        project_id: Some(project),
        status: Some(TransactionStatus::Completed),
        ..TransactionFilter::default()
    };
    let page = reader
        .list_transactions(&completed_for_project, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.meta.total, 1);
    assert_eq!(page.data[0].description, "Servers");

    let past_the_end = reader
        .list_transactions(&incomes, &PageRequest::new(4, 2))
        .await
        .unwrap();
    assert!(past_the_end.data.is_empty());
    assert_eq!(past_the_end.meta.total, 5);
}
