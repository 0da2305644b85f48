//! Ledger Entry Writer
//!
//! Every transfer writes exactly two immutable entries tied to its
//! transaction row: a debit (negated amount) on the sender and a credit
//! (original amount) on the receiver. Their sum is zero.

use rust_decimal::Decimal;
use tracing::debug;

use super::error::{TransferError, TransferStep};
use super::types::LedgerAudit;
use crate::core_types::{AccountId, TransactionId};
use crate::models::{Entry, NewEntry, TransactionRecord};
use crate::money::negate;
use crate::store::{Lookup, UnitOfWork};

/// Write the debit then the credit entry of one transfer.
///
/// Returns on the first failure; the caller's unit of work rolls back.
pub async fn write_transfer_entries<U: UnitOfWork>(
    uow: &mut U,
    transaction_id: TransactionId,
    sender_account_id: AccountId,
    receiver_account_id: AccountId,
    amount: Decimal,
) -> Result<(Entry, Entry), TransferError> {
    let debit = uow
        .create_entry(&NewEntry {
            account_id: sender_account_id,
            transaction_id,
            amount: negate(amount),
        })
        .await
        .map_err(TransferError::storage(TransferStep::DebitEntry))?;
    debug!(
        transaction_id,
        account_id = sender_account_id,
        amount = %debit.amount,
        "Debit entry written"
    );

    let credit = uow
        .create_entry(&NewEntry {
            account_id: receiver_account_id,
            transaction_id,
            amount,
        })
        .await
        .map_err(TransferError::storage(TransferStep::CreditEntry))?;
    debug!(
        transaction_id,
        account_id = receiver_account_id,
        amount = %credit.amount,
        "Credit entry written"
    );

    Ok((debit, credit))
}

fn imbalance(transaction: &TransactionRecord, entry_sum: Decimal, reason: String) -> TransferError {
    TransferError::LedgerImbalance {
        transaction_id: transaction.transaction_id,
        entry_sum,
        reason,
    }
}

/// Check the double-entry invariant of one transaction against its entries.
///
/// Returns the entry sum (always zero on success).
pub fn audit_entries(
    transaction: &TransactionRecord,
    entries: &[Entry],
) -> Result<Decimal, TransferError> {
    let entry_sum: Decimal = entries.iter().map(|e| e.amount).sum();

    if entries.len() != 2 {
        return Err(imbalance(
            transaction,
            entry_sum,
            format!("expected 2 entries, found {}", entries.len()),
        ));
    }
    if !entry_sum.is_zero() {
        return Err(imbalance(
            transaction,
            entry_sum,
            format!("entries sum to {}", entry_sum),
        ));
    }

    let amount = transaction.amount;
    let debit_ok = entries
        .iter()
        .any(|e| e.account_id == transaction.from_account_id && e.amount == negate(amount));
    if !debit_ok {
        return Err(imbalance(
            transaction,
            entry_sum,
            format!("no debit of {} on the sending account", amount),
        ));
    }

    let credit_ok = entries
        .iter()
        .any(|e| e.account_id == transaction.to_account_id && e.amount == amount);
    if !credit_ok {
        return Err(imbalance(
            transaction,
            entry_sum,
            format!("no credit of {} on the receiving account", amount),
        ));
    }

    Ok(entry_sum)
}

/// Read a transaction with its entries and audit them
pub async fn read_ledger<U: UnitOfWork>(
    uow: &mut U,
    transaction_id: TransactionId,
) -> Result<LedgerAudit, TransferError> {
    let transaction = match uow
        .get_transaction(transaction_id)
        .await
        .map_err(TransferError::storage(TransferStep::ReadLedger))?
    {
        Lookup::Found(row) => row,
        Lookup::NotFound => return Err(TransferError::TransactionNotFound(transaction_id)),
    };

    let entries = uow
        .list_entries_for_transaction(transaction_id)
        .await
        .map_err(TransferError::storage(TransferStep::ReadLedger))?;
    let entry_sum = audit_entries(&transaction, &entries)?;

    Ok(LedgerAudit {
        transaction,
        entries,
        entry_sum,
    })
}
