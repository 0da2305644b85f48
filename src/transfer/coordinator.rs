//! Transfer Coordinator
//!
//! Drives one transfer through a single unit of work:
//!
//! ```text
//! validate → resolve reference data → transaction (PENDING)
//!          → debit + credit entries → balances (lower ID first)
//!          → status COMPLETED → commit
//! ```
//!
//! Any failure after validation rolls the whole unit of work back, so a
//! transfer is either fully persisted or not at all. The coordinator does
//! not retry; see [`TransferError::is_retryable`].

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use ulid::Ulid;

use super::balance::update_both_balances;
use super::error::{TransferError, TransferStep};
use super::executor::UnitOfWorkExecutor;
use super::ledger::{read_ledger, write_transfer_entries};
use super::reference::{ReferenceResolver, resolve_transfer_references};
use super::types::{LedgerAudit, TransferParams, TransferResult, ValidatedTransfer};
use crate::config::TransferConfig;
use crate::core_types::TransactionId;
use crate::models::NewTransaction;
use crate::store::{Store, UnitOfWork};

pub const DEFAULT_DESCRIPTION: &str = "Fund Transfer";

/// Transfer Coordinator - the engine's entry point
pub struct TransferCoordinator<S: Store> {
    executor: UnitOfWorkExecutor<S>,
    resolver: ReferenceResolver<S>,
    description: String,
}

impl<S: Store> Clone for TransferCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            resolver: self.resolver.clone(),
            description: self.description.clone(),
        }
    }
}

impl<S: Store> TransferCoordinator<S> {
    /// Create a coordinator without a deadline
    pub fn new(store: Arc<S>) -> Self {
        let executor = UnitOfWorkExecutor::new(store);
        Self {
            resolver: ReferenceResolver::with_executor(executor.clone()),
            executor,
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }

    pub fn from_config(store: Arc<S>, config: &TransferConfig) -> Self {
        Self::new(store)
            .with_timeout(config.timeout())
            .with_description(config.description.clone())
    }

    /// Abort transfers still running after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self.resolver = ReferenceResolver::with_executor(self.executor.clone());
        self
    }

    /// Description stored on transfers that do not carry one
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn resolver(&self) -> &ReferenceResolver<S> {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<S> {
        self.executor.store()
    }

    /// Move `params.amount` from the sender to the receiver.
    ///
    /// Validation errors return before any unit of work is opened.
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, TransferError> {
        let transfer = params.validate()?;
        let reference = transfer
            .reference_number
            .clone()
            .unwrap_or_else(|| Ulid::new().to_string());
        let description = transfer
            .description
            .clone()
            .unwrap_or_else(|| self.description.clone());

        debug!(
            from = transfer.sender_account_id,
            to = transfer.receiver_account_id,
            amount = %transfer.amount,
            currency = %transfer.currency_code,
            reference = %reference,
            "Transfer started"
        );

        let log_reference = reference.clone();
        let outcome = self
            .executor
            .execute(move |uow| {
                Box::pin(async move { run_transfer(uow, transfer, reference, description).await })
            })
            .await;

        match &outcome {
            Ok(result) => info!(
                transaction_id = result.transaction.transaction_id,
                reference = %log_reference,
                from = result.from_account.account_id,
                to = result.to_account.account_id,
                amount = %result.transaction.amount,
                "Transfer committed"
            ),
            Err(e) => warn!(
                reference = %log_reference,
                code = e.code(),
                retryable = e.is_retryable(),
                error = %e,
                "Transfer aborted"
            ),
        }
        outcome
    }

    /// Re-check the double-entry invariant of a stored transaction
    pub async fn verify_ledger(
        &self,
        transaction_id: TransactionId,
    ) -> Result<LedgerAudit, TransferError> {
        let audit = self
            .executor
            .execute(move |uow| Box::pin(async move { read_ledger(uow, transaction_id).await }))
            .await?;
        debug!(transaction_id, entries = audit.entries.len(), "Ledger verified");
        Ok(audit)
    }
}

async fn run_transfer<U: UnitOfWork>(
    uow: &mut U,
    transfer: ValidatedTransfer,
    reference: String,
    description: String,
) -> Result<TransferResult, TransferError> {
    let refs = resolve_transfer_references(uow, &transfer.currency_code).await?;

    let pending = uow
        .create_transaction(&NewTransaction {
            from_account_id: transfer.sender_account_id,
            to_account_id: transfer.receiver_account_id,
            type_code: refs.transfer_type.type_code.clone(),
            amount: transfer.amount,
            currency_code: refs.currency.currency_code.clone(),
            exchange_rate: transfer.exchange_rate,
            status_code: refs.pending.status_code.clone(),
            description: Some(description),
            reference_number: reference,
            transaction_date: Utc::now(),
        })
        .await
        .map_err(TransferError::storage(TransferStep::CreateTransaction))?;
    let transaction_id = pending.transaction_id;
    debug!(transaction_id, step = %TransferStep::CreateTransaction, "Transaction pending");

    let (from_entry, to_entry) = write_transfer_entries(
        uow,
        transaction_id,
        transfer.sender_account_id,
        transfer.receiver_account_id,
        transfer.amount,
    )
    .await?;

    let (from_account, to_account) = update_both_balances(
        uow,
        transfer.sender_account_id,
        transfer.receiver_account_id,
        transfer.amount,
    )
    .await?;

    let transaction = uow
        .update_transaction_status(transaction_id, &refs.completed.status_code)
        .await
        .map_err(TransferError::storage(TransferStep::UpdateStatus))?;
    debug!(transaction_id, step = %TransferStep::UpdateStatus, "Transaction completed");

    Ok(TransferResult {
        transaction,
        from_entry,
        to_entry,
        from_account,
        to_account,
        status: refs.completed,
        transaction_type: refs.transfer_type,
        currency: refs.currency,
    })
}
