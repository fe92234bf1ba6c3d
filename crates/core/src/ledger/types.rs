//! Ledger domain types for posting requests and results.
//!
//! Callers hand the engine already-typed structures; nothing here parses
//! request bodies.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use super::account::Account;
use super::entry::{Direction, EntryInput, TransactionEntry};
use super::error::LedgerError;
use super::transaction::{Transaction, TransactionLinks, TransactionType};

/// Kind of record a posting may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Ledger account.
    Account,
    /// Project link.
    Project,
    /// Category link.
    Category,
    /// Counterparty link.
    Counterparty,
}

impl ReferenceKind {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Project => "project",
            Self::Category => "category",
            Self::Counterparty => "counterparty",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for posting a transaction with arbitrary entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTransactionInput {
    /// Free-text description.
    pub description: String,
    /// Income, expense or transfer.
    pub transaction_type: TransactionType,
    /// Declared total; must equal the debit total.
    pub total_amount: Decimal,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Optional classification links.
    pub links: TransactionLinks,
    /// Entry legs (at least two).
    pub entries: Vec<EntryInput>,
}

/// Shared fields of the two-legged convenience postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplePosting {
    /// Free-text description.
    pub description: String,
    /// Amount moved, in the base currency.
    pub amount: Decimal,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Optional classification links.
    pub links: TransactionLinks,
}

impl SimplePosting {
    /// Creates a posting without links.
    #[must_use]
    pub fn new(description: impl Into<String>, amount: Decimal, transaction_date: NaiveDate) -> Self {
        Self {
            description: description.into(),
            amount,
            transaction_date,
            links: TransactionLinks::default(),
        }
    }

    /// Sets the classification links.
    #[must_use]
    pub fn with_links(mut self, links: TransactionLinks) -> Self {
        self.links = links;
        self
    }
}

impl PostTransactionInput {
    fn two_legged(
        posting: SimplePosting,
        transaction_type: TransactionType,
        debit: AccountId,
        credit: AccountId,
    ) -> Self {
        Self {
            description: posting.description,
            transaction_type,
            total_amount: posting.amount,
            transaction_date: posting.transaction_date,
            links: posting.links,
            entries: vec![
                EntryInput::debit(debit, posting.amount),
                EntryInput::credit(credit, posting.amount),
            ],
        }
    }

    /// Income: bank account DEBIT, income account CREDIT.
    #[must_use]
    pub fn income(bank_account: AccountId, income_account: AccountId, posting: SimplePosting) -> Self {
        Self::two_legged(posting, TransactionType::Income, bank_account, income_account)
    }

    /// Expense: expense account DEBIT, bank account CREDIT.
    #[must_use]
    pub fn expense(
        expense_account: AccountId,
        bank_account: AccountId,
        posting: SimplePosting,
    ) -> Self {
        Self::two_legged(posting, TransactionType::Expense, expense_account, bank_account)
    }

    /// Transfer: destination DEBIT, source CREDIT.
    #[must_use]
    pub fn transfer(from_account: AccountId, to_account: AccountId, posting: SimplePosting) -> Self {
        Self::two_legged(posting, TransactionType::Transfer, to_account, from_account)
    }

    /// Caller-supplied legs; the declared total is the debit total.
    ///
    /// Legs whose debits overflow get a zero total; validation reports the
    /// overflow before the total is looked at.
    #[must_use]
    pub fn complex(
        description: impl Into<String>,
        transaction_type: TransactionType,
        transaction_date: NaiveDate,
        links: TransactionLinks,
        entries: Vec<EntryInput>,
    ) -> Self {
        let total_amount = EntryTotals::of(&entries).map_or(Decimal::ZERO, |totals| totals.debit);
        Self {
            description: description.into(),
            transaction_type,
            total_amount,
            transaction_date,
            links,
            entries,
        }
    }
}

/// Debit and credit totals of a set of legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTotals {
    /// Sum of debit amounts.
    pub debit: Decimal,
    /// Sum of credit amounts.
    pub credit: Decimal,
}

impl EntryTotals {
    /// Sums the legs by direction.
    ///
    /// # Errors
    ///
    /// `AmountOverflow` if either side leaves the representable range.
    pub fn of(entries: &[EntryInput]) -> Result<Self, LedgerError> {
        entries.iter().try_fold(
            Self {
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
            },
            |mut totals, entry| {
                let side = match entry.direction {
                    Direction::Debit => &mut totals.debit,
                    Direction::Credit => &mut totals.credit,
                };
                *side = side
                    .checked_add(entry.amount)
                    .ok_or(LedgerError::AmountOverflow)?;
                Ok(totals)
            },
        )
    }

    /// Exact equality, no tolerance.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}

/// Result of a posting or a draft save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedTransaction {
    /// The stored transaction.
    pub transaction: Transaction,
    /// Its entries, in request order.
    pub entries: Vec<TransactionEntry>,
    /// Accounts as they stand after the commit, ascending by id.
    /// Empty when no balance was touched (drafts).
    pub accounts: Vec<Account>,
}

impl PostedTransaction {
    /// Returns the post-commit state of one account, if it was touched.
    #[must_use]
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }
}
