//! Transfer Types
//!
//! Request/response types of the transfer engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::core_types::AccountId;
use crate::models::{Account, Currency, Entry, TransactionRecord, TransactionStatus, TransactionType};
use crate::money::exchange_rate_from_f64;

/// Longest currency code the reference table accepts
pub const MAX_CURRENCY_CODE_LEN: usize = 10;

/// Input of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferParams {
    pub sender_account_id: AccountId,
    pub receiver_account_id: AccountId,
    /// Magnitude moved from sender to receiver, must be positive
    pub amount: Decimal,
    pub currency_code: String,
    /// Caller-supplied rate, stored as-is (1.0 for same-currency)
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: f64,
    /// Generated when absent
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_exchange_rate() -> f64 {
    1.0
}

impl TransferParams {
    pub fn new(
        sender_account_id: AccountId,
        receiver_account_id: AccountId,
        amount: Decimal,
        currency_code: impl Into<String>,
    ) -> Self {
        Self {
            sender_account_id,
            receiver_account_id,
            amount,
            currency_code: currency_code.into(),
            exchange_rate: default_exchange_rate(),
            reference_number: None,
            description: None,
        }
    }

    pub fn with_exchange_rate(mut self, rate: f64) -> Self {
        self.exchange_rate = rate;
        self
    }

    pub fn with_reference_number(mut self, reference: impl Into<String>) -> Self {
        self.reference_number = Some(reference.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check everything that can be checked without touching storage
    pub fn validate(&self) -> Result<ValidatedTransfer, TransferError> {
        if self.amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }

        if self.sender_account_id == self.receiver_account_id {
            return Err(TransferError::SameAccount);
        }

        let code = self.currency_code.as_str();
        if code.is_empty()
            || code.len() > MAX_CURRENCY_CODE_LEN
            || !code.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(TransferError::InvalidCurrencyCode(
                self.currency_code.clone(),
            ));
        }

        let exchange_rate =
            exchange_rate_from_f64(self.exchange_rate).map_err(TransferError::InvalidExchangeRate)?;

        if let Some(reference) = &self.reference_number
            && reference.trim().is_empty()
        {
            return Err(TransferError::EmptyReferenceNumber);
        }

        Ok(ValidatedTransfer {
            sender_account_id: self.sender_account_id,
            receiver_account_id: self.receiver_account_id,
            amount: self.amount,
            currency_code: self.currency_code.clone(),
            exchange_rate,
            reference_number: self.reference_number.clone(),
            description: self.description.clone(),
        })
    }
}

/// Transfer input after validation; the exchange rate is now a decimal
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTransfer {
    pub sender_account_id: AccountId,
    pub receiver_account_id: AccountId,
    pub amount: Decimal,
    pub currency_code: String,
    pub exchange_rate: Decimal,
    pub reference_number: Option<String>,
    pub description: Option<String>,
}

/// Everything a committed transfer produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transaction: TransactionRecord,
    /// Debit on the sender (negative amount)
    pub from_entry: Entry,
    /// Credit on the receiver (positive amount)
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
    pub status: TransactionStatus,
    pub transaction_type: TransactionType,
    pub currency: Currency,
}

/// Result of re-checking one transaction against its ledger entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub transaction: TransactionRecord,
    pub entries: Vec<Entry>,
    pub entry_sum: Decimal,
}
