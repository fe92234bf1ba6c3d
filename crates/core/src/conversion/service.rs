//! Conversion overlay: posts foreign-currency income and expense through
//! the ledger engine.
//!
//! Collaborators are consulted before any unit of work is opened, each under
//! the configured timeout. A failed rate lookup falls back to the static rate
//! table; a failed reference check aborts the posting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tally_shared::config::{ConversionConfig, LedgerConfig};
use tally_shared::types::{AccountId, CryptoDetailId, CurrencyCode, TransactionId};
use tracing::{info, warn};

use super::currency::{CryptoCurrencyInfo, find_supported, supported_currencies};
use super::detail::{CryptoDetailStore, CryptoTransactionDetail};
use super::rate::{AppliedRate, RateOrigin, RateSource, convert_to_base, normalize_rate};
use super::reference::{ExternalTransfer, ReferenceRejection, ReferenceValidator};
use crate::ledger::{
    LedgerEngine, LedgerError, LedgerStore, MAX_AMOUNT_SCALE, PostedTransaction, SimplePosting,
    TransactionLinks, check_scale,
};

/// Direction of a foreign-currency posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeignKind {
    /// Foreign funds received: base account DEBIT, foreign account CREDIT.
    Income,
    /// Foreign funds spent: foreign account DEBIT, base account CREDIT.
    Expense,
}

/// Request to post a foreign-currency transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignPostingInput {
    /// Income or expense.
    pub kind: ForeignKind,
    /// Amount in the foreign currency, fee excluded.
    pub foreign_amount: Decimal,
    /// Foreign currency code, as supplied by the caller.
    pub currency: String,
    /// Free-text description; the foreign amount is appended.
    pub description: String,
    /// Account tracking the foreign holdings.
    pub foreign_account_id: AccountId,
    /// Account in the base currency.
    pub base_account_id: AccountId,
    /// External transaction hash to validate.
    pub external_ref: Option<String>,
    /// Network fee in the foreign currency; added to the amount for expenses.
    pub fee: Option<Decimal>,
    /// Sending wallet.
    pub wallet_from: Option<String>,
    /// Receiving wallet.
    pub wallet_to: Option<String>,
    /// Business date.
    pub transaction_date: NaiveDate,
    /// Optional classification links.
    pub links: TransactionLinks,
}

impl ForeignPostingInput {
    /// Creates a request with no reference, fee, wallets or links.
    #[must_use]
    pub fn new(
        kind: ForeignKind,
        foreign_amount: Decimal,
        currency: impl Into<String>,
        description: impl Into<String>,
        foreign_account_id: AccountId,
        base_account_id: AccountId,
    ) -> Self {
        Self {
            kind,
            foreign_amount,
            currency: currency.into(),
            description: description.into(),
            foreign_account_id,
            base_account_id,
            external_ref: None,
            fee: None,
            wallet_from: None,
            wallet_to: None,
            transaction_date: Utc::now().date_naive(),
            links: TransactionLinks::default(),
        }
    }

    /// Sets the external reference to validate.
    #[must_use]
    pub fn with_external_ref(mut self, reference: impl Into<String>) -> Self {
        self.external_ref = Some(reference.into());
        self
    }

    /// Sets the network fee.
    #[must_use]
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = Some(fee);
        self
    }
}

/// Outcome of a foreign-currency posting.
#[derive(Debug, Clone, Serialize)]
pub struct ForeignPosting {
    /// The completed ledger posting.
    pub posting: PostedTransaction,
    /// Rate applied, tagged live or fallback.
    pub rate: AppliedRate,
    /// Amount posted in the base currency.
    pub base_amount: Decimal,
    /// Detail row, if it was saved.
    pub detail: Option<CryptoTransactionDetail>,
    /// Set when the posting stands but its detail row could not be saved.
    pub detail_warning: Option<String>,
}

/// Foreign-currency overlay on top of a [`LedgerEngine`].
pub struct ConversionService<S> {
    engine: LedgerEngine<S>,
    rates: Arc<dyn RateSource>,
    references: Arc<dyn ReferenceValidator>,
    fallback_rates: HashMap<String, Decimal>,
    lookup_timeout: Duration,
    base_decimal_places: u32,
}

impl<S> ConversionService<S>
where
    S: LedgerStore + CryptoDetailStore,
{
    /// Wires the overlay from its collaborators and configuration.
    #[must_use]
    pub fn new(
        engine: LedgerEngine<S>,
        rates: Arc<dyn RateSource>,
        references: Arc<dyn ReferenceValidator>,
        conversion: &ConversionConfig,
        ledger: &LedgerConfig,
    ) -> Self {
        let fallback_rates = conversion
            .fallback_rates
            .iter()
            .map(|(code, rate)| (code.to_ascii_uppercase(), *rate))
            .collect();
        Self {
            engine,
            rates,
            references,
            fallback_rates,
            lookup_timeout: conversion.lookup_timeout(),
            base_decimal_places: ledger.base_decimal_places,
        }
    }

    /// The wrapped ledger engine.
    #[must_use]
    pub fn engine(&self) -> &LedgerEngine<S> {
        &self.engine
    }

    /// Converts and posts a foreign-currency transaction.
    ///
    /// # Errors
    ///
    /// `UnsupportedCurrency`, `InvalidExternalReference`, or anything the
    /// ledger engine rejects. A failed detail write is reported through
    /// `detail_warning` instead.
    pub async fn post_foreign_transaction(
        &self,
        input: ForeignPostingInput,
    ) -> Result<ForeignPosting, LedgerError> {
        let (code, info) = resolve_currency(&input.currency)?;
        if input.foreign_amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(input.foreign_amount));
        }
        let fee = input.fee.unwrap_or(Decimal::ZERO);
        if fee < Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(fee));
        }
        check_scale(input.foreign_amount, MAX_AMOUNT_SCALE)?;
        check_scale(fee, MAX_AMOUNT_SCALE)?;

        let rate = self.resolve_rate(&code).await?;
        let transfer = match input.external_ref.as_deref().map(str::trim) {
            Some(reference) if !reference.is_empty() => Some(self.confirm_reference(reference).await?),
            _ => None,
        };

        let gross = match input.kind {
            ForeignKind::Income => input.foreign_amount,
            ForeignKind::Expense => input
                .foreign_amount
                .checked_add(fee)
                .ok_or(LedgerError::AmountOverflow)?,
        };
        let base_amount = convert_to_base(gross, rate.rate, self.base_decimal_places)?;

        let posting = SimplePosting {
            description: format!("{} ({} {})", input.description, input.foreign_amount, code),
            amount: base_amount,
            transaction_date: input.transaction_date,
            links: input.links,
        };
        let posted = match input.kind {
            ForeignKind::Income => {
                self.engine
                    .post_income(input.base_account_id, input.foreign_account_id, posting)
                    .await?
            }
            ForeignKind::Expense => {
                self.engine
                    .post_expense(input.foreign_account_id, input.base_account_id, posting)
                    .await?
            }
        };

        let detail = build_detail(&input, posted.transaction.id, &code, info, &rate, transfer);
        let (detail, detail_warning) =
            match self.engine.store().save_crypto_detail(&detail).await {
                Ok(()) => (Some(detail), None),
                Err(err) => {
                    warn!(
                        transaction_id = %posted.transaction.id,
                        error = %err,
                        "Crypto detail not saved; posting kept"
                    );
                    (None, Some(format!("crypto detail not saved: {err}")))
                }
            };

        info!(
            transaction_id = %posted.transaction.id,
            currency = %code,
            foreign_amount = %input.foreign_amount,
            base_amount = %base_amount,
            rate = %rate.rate,
            rate_origin = %rate.origin,
            "Foreign transaction posted"
        );

        Ok(ForeignPosting {
            posting: posted,
            rate,
            base_amount,
            detail,
            detail_warning,
        })
    }

    /// Quotes every supported currency, live or fallback.
    ///
    /// # Errors
    ///
    /// `RateUnavailable` only if a currency has neither a live quote nor a
    /// configured fallback.
    pub async fn current_rates(&self) -> Result<Vec<AppliedRate>, LedgerError> {
        let mut rates = Vec::with_capacity(supported_currencies().len());
        for info in supported_currencies() {
            let code = CurrencyCode::parse(info.code)
                .map_err(|err| LedgerError::UnsupportedCurrency(err.to_string()))?;
            rates.push(self.resolve_rate(&code).await?);
        }
        Ok(rates)
    }

    /// Finds the detail row of a transaction.
    pub async fn crypto_detail(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<CryptoTransactionDetail>, LedgerError> {
        self.engine.store().find_crypto_detail(transaction_id).await
    }

    /// Checks an external reference against the validator under the lookup
    /// timeout. Only a known, confirmed transfer is accepted.
    ///
    /// # Errors
    ///
    /// The [`ReferenceRejection`] explaining why the reference is not usable.
    pub async fn validate_reference(
        &self,
        reference: &str,
    ) -> Result<ExternalTransfer, ReferenceRejection> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ReferenceRejection::Blank);
        }

        match tokio::time::timeout(self.lookup_timeout, self.references.lookup(reference)).await {
            Ok(Ok(Some(transfer))) if transfer.confirmed => Ok(transfer),
            Ok(Ok(Some(transfer))) => Err(ReferenceRejection::Unconfirmed(transfer)),
            Ok(Ok(None)) => Err(ReferenceRejection::Unknown),
            Ok(Err(err)) => Err(ReferenceRejection::LookupFailed(err.to_string())),
            Err(_) => Err(ReferenceRejection::TimedOut),
        }
    }

    /// Live rate under the timeout, else the configured fallback. Either is
    /// rounded to the stored rate precision and must stay positive.
    async fn resolve_rate(&self, code: &CurrencyCode) -> Result<AppliedRate, LedgerError> {
        let failure = match tokio::time::timeout(self.lookup_timeout, self.rates.rate(code)).await
        {
            Ok(Ok(rate)) if normalize_rate(rate) > Decimal::ZERO => {
                return Ok(AppliedRate {
                    currency: code.clone(),
                    rate: normalize_rate(rate),
                    origin: RateOrigin::Live,
                });
            }
            Ok(Ok(rate)) => format!("non-positive rate {rate}"),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {:?}", self.lookup_timeout),
        };

        let fallback = self
            .fallback_rates
            .get(code.as_str())
            .copied()
            .map(normalize_rate)
            .filter(|rate| *rate > Decimal::ZERO)
            .ok_or_else(|| LedgerError::RateUnavailable(code.to_string()))?;
        warn!(currency = %code, reason = %failure, rate = %fallback, "Using fallback rate");

        Ok(AppliedRate {
            currency: code.clone(),
            rate: fallback,
            origin: RateOrigin::Fallback,
        })
    }

    /// The reference must be known and confirmed; anything else is fatal.
    async fn confirm_reference(&self, reference: &str) -> Result<ExternalTransfer, LedgerError> {
        self.validate_reference(reference).await.map_err(|rejection| {
            warn!(reference, reason = %rejection, "External reference rejected");
            LedgerError::InvalidExternalReference(reference.to_string())
        })
    }
}

fn resolve_currency(raw: &str) -> Result<(CurrencyCode, &'static CryptoCurrencyInfo), LedgerError> {
    let unsupported = || LedgerError::UnsupportedCurrency(raw.trim().to_string());
    let code = CurrencyCode::parse(raw).map_err(|_| unsupported())?;
    let info = find_supported(&code).ok_or_else(unsupported)?;
    Ok((code, info))
}

fn build_detail(
    input: &ForeignPostingInput,
    transaction_id: TransactionId,
    code: &CurrencyCode,
    info: &CryptoCurrencyInfo,
    rate: &AppliedRate,
    transfer: Option<ExternalTransfer>,
) -> CryptoTransactionDetail {
    let external_ref = input
        .external_ref
        .as_deref()
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string);
    let (block_number, confirmation_count, from_address, to_address) = match transfer {
        Some(transfer) => (
            transfer.block_number,
            i32::from(transfer.confirmed),
            transfer.from_address,
            transfer.to_address,
        ),
        None => (None, 0, None, None),
    };

    CryptoTransactionDetail {
        id: CryptoDetailId::new(),
        transaction_id,
        currency: code.clone(),
        network: info.network.to_string(),
        foreign_amount: input.foreign_amount,
        rate: rate.rate,
        rate_origin: rate.origin,
        external_ref,
        wallet_from: input.wallet_from.clone().or(from_address),
        wallet_to: input.wallet_to.clone().or(to_address),
        fee: input.fee,
        block_number,
        confirmation_count,
        created_at: Utc::now(),
    }
}
