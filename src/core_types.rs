//! Core types used throughout the engine
//!
//! Identifiers are `i64` because they map straight onto PostgreSQL
//! `BIGSERIAL` columns.

/// Account ID - primary key of `accounts`.
///
/// # Ordering:
/// Balance updates inside one transfer always touch the lower account ID
/// first. Every concurrent transfer between the same pair therefore locks
/// the two rows in the same order.
pub type AccountId = i64;

/// Transaction ID - primary key of `transactions` (one per transfer attempt)
pub type TransactionId = i64;

/// Entry ID - primary key of `entries`
pub type EntryId = i64;

/// Owning user of an account
pub type UserId = i64;
