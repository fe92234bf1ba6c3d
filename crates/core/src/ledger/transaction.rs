//! Transaction aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{CategoryId, CounterpartyId, ProjectId, TransactionId};
use uuid::Uuid;

use super::types::ReferenceKind;

/// Transaction lifecycle status.
///
/// `Draft -> Pending -> Completed`, with `Cancelled` reachable from the two
/// open states. Only the move into `Completed` touches balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Saved but not submitted; the only deletable state.
    Draft,
    /// Submitted, or mid-commit inside a posting.
    Pending,
    /// Entries applied to account balances.
    Completed,
    /// Abandoned before completion.
    Cancelled,
}

impl TransactionStatus {
    /// Returns true if a transaction may move from `self` to `to`.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Pending | Self::Completed | Self::Cancelled)
                | (Self::Pending, Self::Completed | Self::Cancelled)
        )
    }

    /// Returns the lowercase storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
    /// Money moving between owned accounts.
    Transfer,
}

impl TransactionType {
    /// Returns the lowercase storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional links from a transaction to classification records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLinks {
    /// Linked project.
    pub project_id: Option<ProjectId>,
    /// Linked category.
    pub category_id: Option<CategoryId>,
    /// Linked counterparty.
    pub counterparty_id: Option<CounterpartyId>,
}

impl TransactionLinks {
    /// Returns every present link as `(kind, id)`, in project, category,
    /// counterparty order.
    #[must_use]
    pub fn references(&self) -> Vec<(ReferenceKind, Uuid)> {
        [
            self.project_id.map(|id| (ReferenceKind::Project, id.into_inner())),
            self.category_id.map(|id| (ReferenceKind::Category, id.into_inner())),
            self.counterparty_id
                .map(|id| (ReferenceKind::Counterparty, id.into_inner())),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// A financial transaction whose entries balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Free-text description.
    pub description: String,
    /// Income, expense or transfer.
    pub transaction_type: TransactionType,
    /// Current status.
    pub status: TransactionStatus,
    /// Total amount; equals the debit total and the credit total.
    pub total_amount: Decimal,
    /// Business date of the transaction.
    pub transaction_date: NaiveDate,
    /// Optional classification links.
    pub links: TransactionLinks,
    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
    /// When the transaction was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Returns true if the transaction can be deleted.
    #[must_use]
    pub fn is_deletable(&self) -> bool {
        self.status == TransactionStatus::Draft
    }

    /// Returns true if the entries of this transaction count toward balances.
    #[must_use]
    pub fn affects_balances(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

/// Filter for transaction listings. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Only this type.
    pub transaction_type: Option<TransactionType>,
    /// Only this status.
    pub status: Option<TransactionStatus>,
    /// Only transactions linked to this project.
    pub project_id: Option<ProjectId>,
    /// Only transactions linked to this category.
    pub category_id: Option<CategoryId>,
    /// Only transactions linked to this counterparty.
    pub counterparty_id: Option<CounterpartyId>,
}

impl TransactionFilter {
    /// Returns true if `transaction` passes every set field.
    #[must_use]
    pub fn matches(&self, transaction: &Transaction) -> bool {
        fn passes<T: PartialEq>(wanted: Option<T>, actual: Option<T>) -> bool {
            wanted.is_none() || wanted == actual
        }

        passes(self.transaction_type, Some(transaction.transaction_type))
            && passes(self.status, Some(transaction.status))
            && passes(self.project_id, transaction.links.project_id)
            && passes(self.category_id, transaction.links.category_id)
            && passes(self.counterparty_id, transaction.links.counterparty_id)
    }
}
