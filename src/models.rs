// models.rs - Rows persisted by the transfer engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core_types::{AccountId, EntryId, TransactionId, UserId};

// ============================================================
// ACCOUNT
// ============================================================

/// Account row.
///
/// `balance` is only ever changed through the store's atomic
/// add-delta statement; nothing in the engine writes it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub account_id: AccountId,
    pub user_id: UserId,
    pub account_number: String,
    pub account_type: String,
    pub currency_code: String,
    pub balance: Decimal,
    pub interest_rate: Decimal,
    pub overdraft_limit: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================
// LEDGER ENTRY
// ============================================================

/// One signed side of a money movement. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub entry_id: EntryId,
    /// Nullable for legacy rows; always set by the engine
    pub account_id: Option<AccountId>,
    /// Nullable for legacy rows; always set by the engine
    pub transaction_id: Option<TransactionId>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    pub amount: Decimal,
}

// ============================================================
// TRANSACTION (transfer record)
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub type_code: String,
    /// Magnitude of the movement, always positive
    pub amount: Decimal,
    pub currency_code: String,
    pub exchange_rate: Decimal,
    pub status_code: String,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub type_code: String,
    pub amount: Decimal,
    pub currency_code: String,
    pub exchange_rate: Decimal,
    pub status_code: String,
    pub description: Option<String>,
    pub reference_number: String,
    pub transaction_date: DateTime<Utc>,
}

// ============================================================
// REFERENCE DATA
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransactionStatus {
    pub status_code: String,
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransactionType {
    pub type_code: String,
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Currency {
    pub currency_code: String,
    pub currency_name: String,
    pub symbol: Option<String>,
    pub is_active: bool,
    pub exchange_rate: Decimal,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCurrency {
    pub currency_code: String,
    pub currency_name: String,
    pub symbol: Option<String>,
    pub exchange_rate: Decimal,
}
