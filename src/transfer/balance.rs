//! Balance Mutator
//!
//! Balances move only through the store's single-statement add-delta
//! update. When a transfer touches two accounts the lower account ID is
//! always updated first, whichever side is sending, so any two transfers
//! over the same pair take their row locks in the same order.

use rust_decimal::Decimal;
use tracing::debug;

use super::error::{TransferError, TransferStep};
use crate::core_types::AccountId;
use crate::models::Account;
use crate::money::negate;
use crate::store::UnitOfWork;

/// Add `delta` to one account's balance
pub async fn apply_balance_delta<U: UnitOfWork>(
    uow: &mut U,
    account_id: AccountId,
    delta: Decimal,
) -> Result<Account, TransferError> {
    let account = uow
        .add_account_balance(account_id, delta)
        .await
        .map_err(TransferError::storage(TransferStep::UpdateBalance(account_id)))?;
    debug!(account_id, delta = %delta, balance = %account.balance, "Balance updated");
    Ok(account)
}

/// Order in which two accounts' rows are locked
#[inline]
pub fn lock_order(a: AccountId, b: AccountId) -> (AccountId, AccountId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Debit the sender and credit the receiver, lower account ID first.
///
/// Returns `(sender, receiver)` rows after the update.
pub async fn update_both_balances<U: UnitOfWork>(
    uow: &mut U,
    sender_account_id: AccountId,
    receiver_account_id: AccountId,
    amount: Decimal,
) -> Result<(Account, Account), TransferError> {
    let debit = negate(amount);

    let (first, _) = lock_order(sender_account_id, receiver_account_id);
    if first == sender_account_id {
        let sender = apply_balance_delta(uow, sender_account_id, debit).await?;
        let receiver = apply_balance_delta(uow, receiver_account_id, amount).await?;
        Ok((sender, receiver))
    } else {
        let receiver = apply_balance_delta(uow, receiver_account_id, amount).await?;
        let sender = apply_balance_delta(uow, sender_account_id, debit).await?;
        Ok((sender, receiver))
    }
}
