//! Ledger entry domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, EntryId, TransactionId};

/// Direction of a ledger entry.
///
/// Debits increase the balance of the account they touch, credits decrease it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Debit entry (increases the account balance).
    Debit,
    /// Credit entry (decreases the account balance).
    Credit,
}

impl Direction {
    /// Applies this direction's sign to a positive amount.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Debit => amount,
            Self::Credit => -amount,
        }
    }

    /// Returns the lowercase storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leg of a posting request, before it is assigned an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInput {
    /// The account this leg moves.
    pub account_id: AccountId,
    /// Positive amount in the base currency.
    pub amount: Decimal,
    /// Debit or credit.
    pub direction: Direction,
    /// Optional free-text note.
    pub note: Option<String>,
}

impl EntryInput {
    /// Creates a debit leg.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            direction: Direction::Debit,
            note: None,
        }
    }

    /// Creates a credit leg.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            direction: Direction::Credit,
            note: None,
        }
    }

    /// Attaches a note to the leg.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A persisted entry belonging to a transaction.
///
/// Immutable once its transaction is completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    /// Unique identifier for this entry.
    pub id: EntryId,
    /// The transaction this entry belongs to.
    pub transaction_id: TransactionId,
    /// The account affected by this entry.
    pub account_id: AccountId,
    /// Whether this is a debit or credit.
    pub direction: Direction,
    /// Positive amount in the base currency.
    pub amount: Decimal,
    /// Optional free-text note.
    pub note: Option<String>,
}

impl TransactionEntry {
    /// Materializes an input leg for the given transaction.
    #[must_use]
    pub fn from_input(transaction_id: TransactionId, input: &EntryInput) -> Self {
        Self {
            id: EntryId::new(),
            transaction_id,
            account_id: input.account_id,
            direction: input.direction,
            amount: input.amount,
            note: input.note.clone(),
        }
    }

    /// Returns the signed amount (positive for debit, negative for credit).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }
}
