//! Transaction Status and Type Codes
//!
//! Codes are stored as short strings in the reference tables
//! (`transaction_statuses`, `transaction_types`).
//!
//! # Transfer lifecycle
//!
//! ```text
//! PENDING ──► COMPLETED
//!    │
//!    └──► (aborted: rolled back together with the PENDING row)
//! ```
//!
//! FAILED, CANCELLED and REVERSED exist in the catalog for other flows; the
//! transfer engine never persists them.

use std::fmt;

/// Transaction status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatusCode {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Reversed,
}

impl TransactionStatusCode {
    pub const ALL: [TransactionStatusCode; 5] = [
        TransactionStatusCode::Pending,
        TransactionStatusCode::Completed,
        TransactionStatusCode::Failed,
        TransactionStatusCode::Cancelled,
        TransactionStatusCode::Reversed,
    ];

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatusCode::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatusCode::Pending => "PENDING",
            TransactionStatusCode::Completed => "COMPLETED",
            TransactionStatusCode::Failed => "FAILED",
            TransactionStatusCode::Cancelled => "CANCELLED",
            TransactionStatusCode::Reversed => "REVERSED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TransactionStatusCode::Pending => "Transaction is pending",
            TransactionStatusCode::Completed => "Transaction completed successfully",
            TransactionStatusCode::Failed => "Transaction failed",
            TransactionStatusCode::Cancelled => "Transaction was cancelled",
            TransactionStatusCode::Reversed => "Transaction was reversed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == code)
    }
}

impl fmt::Display for TransactionStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionTypeCode {
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
    Refund,
    Adjustment,
    Fee,
    Interest,
}

impl TransactionTypeCode {
    pub const ALL: [TransactionTypeCode; 8] = [
        TransactionTypeCode::Transfer,
        TransactionTypeCode::Deposit,
        TransactionTypeCode::Withdrawal,
        TransactionTypeCode::Payment,
        TransactionTypeCode::Refund,
        TransactionTypeCode::Adjustment,
        TransactionTypeCode::Fee,
        TransactionTypeCode::Interest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionTypeCode::Transfer => "TRANSFER",
            TransactionTypeCode::Deposit => "DEPOSIT",
            TransactionTypeCode::Withdrawal => "WITHDRAWAL",
            TransactionTypeCode::Payment => "PAYMENT",
            TransactionTypeCode::Refund => "REFUND",
            TransactionTypeCode::Adjustment => "ADJUSTMENT",
            TransactionTypeCode::Fee => "FEE",
            TransactionTypeCode::Interest => "INTEREST",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TransactionTypeCode::Transfer => "Transfer between accounts",
            TransactionTypeCode::Deposit => "Deposit into account",
            TransactionTypeCode::Withdrawal => "Withdrawal from account",
            TransactionTypeCode::Payment => "Payment to a third party",
            TransactionTypeCode::Refund => "Refund of a previous payment",
            TransactionTypeCode::Adjustment => "Manual balance adjustment",
            TransactionTypeCode::Fee => "Fee charged to account",
            TransactionTypeCode::Interest => "Interest credited to account",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == code)
    }
}

impl fmt::Display for TransactionTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
