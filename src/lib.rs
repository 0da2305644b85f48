//! Transfer Engine - transactional funds transfer between accounts
//!
//! Moves money between two accounts of a relational ledger so that the
//! transaction row, both ledger entries and both balance changes commit
//! together or not at all.
//!
//! # Modules
//!
//! - [`core_types`] - ID aliases (AccountId, TransactionId, ...)
//! - [`models`] - Persisted rows (Account, Entry, TransactionRecord, reference data)
//! - [`money`] - Decimal parsing, negation and exchange-rate conversion
//! - [`store`] - Storage contract plus PostgreSQL and in-memory backends
//! - [`transfer`] - Executor, resolver, ledger writer, balance mutator, coordinator
//! - [`db`] - PostgreSQL pool, health check and migrations
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod models;
pub mod money;

// Storage and engine
pub mod store;
pub mod transfer;

// Infrastructure
pub mod config;
pub mod db;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, EntryId, TransactionId, UserId};
pub use models::{Account, Currency, Entry, TransactionRecord, TransactionStatus, TransactionType};
pub use store::{Lookup, MemoryStore, PgStore, Store, StoreError, UnitOfWork};
pub use transfer::{
    LedgerAudit, ReferenceResolver, TransferCoordinator, TransferError, TransferParams,
    TransferResult, UnitOfWorkExecutor,
};
