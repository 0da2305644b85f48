//! Transfer Error Types
//!
//! One error type for the whole engine. Storage failures carry the step
//! that was running when they happened so an operator can tell a failed
//! debit entry from a failed balance update.

use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core_types::{AccountId, TransactionId};
use crate::money::MoneyError;
use crate::store::StoreError;

/// Step of a transfer that touched storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    CreateTransaction,
    DebitEntry,
    CreditEntry,
    UpdateBalance(AccountId),
    UpdateStatus,
    ReadLedger,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStep::CreateTransaction => write!(f, "create transfer transaction"),
            TransferStep::DebitEntry => write!(f, "create debit entry"),
            TransferStep::CreditEntry => write!(f, "create credit entry"),
            TransferStep::UpdateBalance(id) => write!(f, "update balance of account {}", id),
            TransferStep::UpdateStatus => write!(f, "update transaction status"),
            TransferStep::ReadLedger => write!(f, "read ledger"),
        }
    }
}

/// Transfer error types
#[derive(Error, Debug)]
pub enum TransferError {
    // === Validation Errors (nothing written) ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and target account cannot be the same")]
    SameAccount,

    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    #[error("Invalid exchange rate: {0}")]
    InvalidExchangeRate(#[source] MoneyError),

    #[error("Reference code must not be empty")]
    EmptyReferenceCode,

    #[error("Reference number must not be empty")]
    EmptyReferenceNumber,

    // === Reference Data ===
    #[error("Failed to resolve {table} {code}: {source}")]
    ReferenceData {
        table: &'static str,
        code: String,
        #[source]
        source: StoreError,
    },

    #[error("{table} {code} reported as existing but could not be read back")]
    ReferenceVanished { table: &'static str, code: String },

    // === Storage Steps ===
    #[error("Failed to {step}: {source}")]
    Storage {
        step: TransferStep,
        #[source]
        source: StoreError,
    },

    // === Unit of Work ===
    #[error("Failed to begin unit of work: {0}")]
    Begin(#[source] StoreError),

    #[error("Failed to commit unit of work: {0}")]
    Commit(#[source] StoreError),

    #[error("{cause}; rollback also failed: {rollback}")]
    RollbackFailed {
        cause: Box<TransferError>,
        rollback: StoreError,
    },

    #[error("Unit of work exceeded {0:?} and was aborted")]
    TimedOut(Duration),

    // === Ledger Audit ===
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Ledger imbalance on transaction {transaction_id}: {reason}")]
    LedgerImbalance {
        transaction_id: TransactionId,
        entry_sum: Decimal,
        reason: String,
    },
}

impl TransferError {
    pub(crate) fn storage(step: TransferStep) -> impl FnOnce(StoreError) -> TransferError {
        move |source| TransferError::Storage { step, source }
    }

    /// The storage error at the root of this failure, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            TransferError::ReferenceData { source, .. }
            | TransferError::Storage { source, .. }
            | TransferError::Begin(source)
            | TransferError::Commit(source) => Some(source),
            TransferError::RollbackFailed { cause, .. } => cause.store_error(),
            _ => None,
        }
    }

    /// Whether retrying the whole transfer from scratch may succeed.
    ///
    /// Safe because nothing is committed before the final step.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::TimedOut(_) => true,
            _ => self.store_error().is_some_and(StoreError::is_retryable),
        }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::InvalidCurrencyCode(_) => "INVALID_CURRENCY",
            TransferError::InvalidExchangeRate(_) => "INVALID_EXCHANGE_RATE",
            TransferError::EmptyReferenceCode => "INVALID_REFERENCE_CODE",
            TransferError::EmptyReferenceNumber => "INVALID_REFERENCE_NUMBER",
            TransferError::ReferenceData { .. } | TransferError::ReferenceVanished { .. } => {
                "REFERENCE_DATA_ERROR"
            }
            TransferError::Storage {
                source: StoreError::NotFound(_),
                step:
                    TransferStep::CreateTransaction
                    | TransferStep::DebitEntry
                    | TransferStep::CreditEntry
                    | TransferStep::UpdateBalance(_),
            } => "ACCOUNT_NOT_FOUND",
            TransferError::Storage {
                source: StoreError::UniqueViolation(_),
                ..
            } => "DUPLICATE_REFERENCE",
            TransferError::Storage { .. } => "DATABASE_ERROR",
            TransferError::Begin(_) | TransferError::Commit(_) => "DATABASE_ERROR",
            TransferError::RollbackFailed { .. } => "ROLLBACK_FAILED",
            TransferError::TimedOut(_) => "TIMEOUT",
            TransferError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            TransferError::LedgerImbalance { .. } => "LEDGER_IMBALANCE",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self.code() {
            "INVALID_AMOUNT"
            | "SAME_ACCOUNT"
            | "INVALID_CURRENCY"
            | "INVALID_EXCHANGE_RATE"
            | "INVALID_REFERENCE_CODE"
            | "INVALID_REFERENCE_NUMBER" => 400,
            "ACCOUNT_NOT_FOUND" | "TRANSACTION_NOT_FOUND" => 404,
            "DUPLICATE_REFERENCE" => 409,
            "TIMEOUT" => 504,
            _ if self.is_retryable() => 409,
            _ => 500,
        }
    }
}
