//! Storage Contract
//!
//! The engine talks to its relational store only through these two traits:
//!
//! - [`Store`] opens units of work (one database transaction each)
//! - [`UnitOfWork`] is the transaction-scoped query handle; it exposes exactly
//!   the operations the transfer engine needs and nothing else
//!
//! Backends:
//! - [`postgres::PgStore`] - production, sqlx over PostgreSQL
//! - [`memory::MemoryStore`] - in-process, used by tests and dry runs

pub mod memory;
pub mod postgres;

pub use memory::{FaultPoint, MemoryStore};
pub use postgres::{PgStore, PgUnitOfWork};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::{AccountId, TransactionId};
use crate::models::{
    Account, Currency, Entry, NewCurrency, NewEntry, NewTransaction, TransactionRecord,
    TransactionStatus, TransactionType,
};

/// PostgreSQL SQLSTATE for `serialization_failure`
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// PostgreSQL SQLSTATE for `deadlock_detected`
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

/// Outcome of a keyed read. Absence is an expected branch, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(row) => Some(row),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(row: Option<T>) -> Self {
        match row {
            Some(row) => Lookup::Found(row),
            None => Lookup::NotFound,
        }
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A write addressed a row that does not exist (or is inactive)
    #[error("Row not found: {0}")]
    NotFound(String),

    /// Insert lost against an existing row with the same key.
    /// The unit of work stays usable.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend failure not coming from sqlx (in-memory store, injected faults)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Transient failures where retrying the whole transfer from scratch is safe
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(e) => match e.as_database_error().and_then(|d| d.code()) {
                Some(code) => {
                    code == SQLSTATE_SERIALIZATION_FAILURE || code == SQLSTATE_DEADLOCK_DETECTED
                }
                None => matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)),
            },
            _ => false,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::UniqueViolation(_) => true,
            StoreError::Database(e) => e
                .as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Factory for units of work. Injected into every engine component.
#[async_trait]
pub trait Store: Send + Sync {
    type UnitOfWork: UnitOfWork;

    /// Open a new database transaction
    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError>;
}

/// Transaction-scoped query handle.
///
/// Nothing is visible outside the unit of work until [`UnitOfWork::commit`]
/// succeeds. Dropping a unit of work without committing discards it.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;

    // === Accounts ===

    async fn get_account(&mut self, account_id: AccountId) -> Result<Lookup<Account>, StoreError>;

    /// Add `delta` to the balance of an active account in one atomic
    /// statement and return the updated row.
    ///
    /// The row stays locked until the unit of work ends.
    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Account, StoreError>;

    // === Transactions ===

    async fn create_transaction(
        &mut self,
        new: &NewTransaction,
    ) -> Result<TransactionRecord, StoreError>;

    async fn get_transaction(
        &mut self,
        transaction_id: TransactionId,
    ) -> Result<Lookup<TransactionRecord>, StoreError>;

    async fn update_transaction_status(
        &mut self,
        transaction_id: TransactionId,
        status_code: &str,
    ) -> Result<TransactionRecord, StoreError>;

    // === Entries ===

    async fn create_entry(&mut self, new: &NewEntry) -> Result<Entry, StoreError>;

    /// Entries of one transaction in insertion order
    async fn list_entries_for_transaction(
        &mut self,
        transaction_id: TransactionId,
    ) -> Result<Vec<Entry>, StoreError>;

    // === Reference data ===

    async fn get_transaction_status(
        &mut self,
        code: &str,
    ) -> Result<Lookup<TransactionStatus>, StoreError>;

    /// Returns [`StoreError::UniqueViolation`] if the code already exists
    async fn create_transaction_status(
        &mut self,
        code: &str,
        description: &str,
    ) -> Result<TransactionStatus, StoreError>;

    async fn get_transaction_type(
        &mut self,
        code: &str,
    ) -> Result<Lookup<TransactionType>, StoreError>;

    /// Returns [`StoreError::UniqueViolation`] if the code already exists
    async fn create_transaction_type(
        &mut self,
        code: &str,
        description: &str,
    ) -> Result<TransactionType, StoreError>;

    async fn get_currency(&mut self, code: &str) -> Result<Lookup<Currency>, StoreError>;

    /// Returns [`StoreError::UniqueViolation`] if the code already exists
    async fn create_currency(&mut self, new: &NewCurrency) -> Result<Currency, StoreError>;
}
