//! Account records and their running balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, CurrencyCode};

use super::entry::Direction;
use super::error::LedgerError;

/// Kind of account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Bank account.
    Bank,
    /// Crypto wallet.
    Crypto,
    /// Cash on hand.
    Cash,
    /// Investment account.
    Investment,
}

impl AccountKind {
    /// Returns the lowercase storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Crypto => "crypto",
            Self::Cash => "cash",
            Self::Investment => "investment",
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account with its running balance.
///
/// The balance always equals the signed sum of completed entries against the
/// account. `version` is bumped on every balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Account kind.
    pub kind: AccountKind,
    /// Currency label of the account.
    pub currency: CurrencyCode,
    /// Running balance in the base currency.
    pub balance: Decimal,
    /// Inactive accounts reject new postings.
    pub is_active: bool,
    /// Monotonic mutation counter.
    pub version: i64,
    /// Optional description.
    pub description: Option<String>,
}

impl Account {
    /// Opens a new active account with a zero balance.
    #[must_use]
    pub fn open(new: NewAccount) -> Self {
        Self {
            id: AccountId::new(),
            name: new.name,
            kind: new.kind,
            currency: new.currency,
            balance: Decimal::ZERO,
            is_active: true,
            version: 0,
            description: new.description,
        }
    }

    /// Applies one entry's delta in place and bumps the version.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if the new balance is not representable; the
    /// account is left untouched.
    pub fn apply(&mut self, direction: Direction, amount: Decimal) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(direction.signed(amount))
            .ok_or(LedgerError::AmountOverflow)?;
        self.version += 1;
        Ok(())
    }
}

/// Input for opening an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Display name.
    pub name: String,
    /// Account kind.
    pub kind: AccountKind,
    /// Currency label.
    pub currency: CurrencyCode,
    /// Optional description.
    pub description: Option<String>,
}

impl NewAccount {
    /// Creates an account input without a description.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AccountKind, currency: CurrencyCode) -> Self {
        Self {
            name: name.into(),
            kind,
            currency,
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        CurrencyCode::parse("USD").unwrap()
    }

    #[test]
    fn test_open_starts_empty_and_active() {
        let account = Account::open(NewAccount::new("Checking", AccountKind::Bank, usd()));
        assert_eq!(account.balance, Decimal::ZERO);
        assert!(account.is_active);
        assert_eq!(account.version, 0);
    }

    #[test]
    fn test_apply_debit_and_credit() {
        let mut account = Account::open(NewAccount::new("Checking", AccountKind::Bank, usd()));
        account.apply(Direction::Debit, dec!(100.00)).unwrap();
        account.apply(Direction::Credit, dec!(30.25)).unwrap();
        assert_eq!(account.balance, dec!(69.75));
        assert_eq!(account.version, 2);
    }

    #[test]
    fn test_apply_overflow_leaves_account_untouched() {
        let mut account = Account::open(NewAccount::new("Vault", AccountKind::Bank, usd()));
        account.apply(Direction::Debit, Decimal::MAX).unwrap();

        let result = account.apply(Direction::Debit, dec!(1));
        assert!(matches!(result, Err(LedgerError::AmountOverflow)));
        assert_eq!(account.balance, Decimal::MAX);
        assert_eq!(account.version, 1);
    }
}
