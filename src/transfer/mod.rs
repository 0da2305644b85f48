//! Transactional Funds Transfer
//!
//! Moves money between two accounts inside one storage unit of work,
//! recording a transaction row and a pair of ledger entries.
//!
//! # Flow
//!
//! ```text
//! TransferCoordinator::transfer
//!   └─ UnitOfWorkExecutor::execute ── begin ─┐
//!        ├─ reference::resolve_transfer_references   (get-or-create)
//!        ├─ create transaction (PENDING)
//!        ├─ ledger::write_transfer_entries            (-amount, +amount)
//!        ├─ balance::update_both_balances             (lower ID first)
//!        └─ update status (COMPLETED)
//!                                           commit ──┘ / rollback on error
//! ```
//!
//! # Invariants
//!
//! 1. **Zero-sum**: the two entries of a transfer sum to exactly zero
//! 2. **All or nothing**: the transaction row, both entries and both balance
//!    changes commit together or not at all
//! 3. **Lock order**: balances are updated lower account ID first, in both
//!    transfer directions
//! 4. **No ambient state**: every component receives its store at construction

pub mod balance;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod reference;
pub mod state;
pub mod types;

#[cfg(test)]
mod integration_tests;

// Re-exports for convenience
pub use coordinator::TransferCoordinator;
pub use error::{TransferError, TransferStep};
pub use executor::UnitOfWorkExecutor;
pub use reference::ReferenceResolver;
pub use state::{TransactionStatusCode, TransactionTypeCode};
pub use types::{LedgerAudit, TransferParams, TransferResult, ValidatedTransfer};
