//! Unit-of-Work Executor
//!
//! The only place in the engine that opens, commits or rolls back a
//! database transaction. Callers hand it a closure that receives the
//! transaction-scoped handle:
//!
//! ```ignore
//! let value = executor
//!     .execute(|uow| Box::pin(async move { do_work(uow).await }))
//!     .await?;
//! ```
//!
//! - closure returns `Ok` → commit (a failed commit is returned as `Commit`)
//! - closure returns `Err` → rollback, original error returned
//! - rollback itself fails → `RollbackFailed` carrying both errors
//! - deadline elapses → in-flight work dropped, rollback, `TimedOut`
//!
//! The deadline starts before `begin`, so waiting for a pooled connection
//! counts against it. `commit` is never cut off: a dropped commit leaves the
//! outcome unknown, and `TimedOut` promises nothing was written.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::error::TransferError;
use crate::store::{Store, UnitOfWork};

/// Runs closures inside units of work opened on an injected store
pub struct UnitOfWorkExecutor<S: Store> {
    store: Arc<S>,
    timeout: Option<Duration>,
}

impl<S: Store> Clone for UnitOfWorkExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: Store> UnitOfWorkExecutor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Abort any unit of work still running after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Execute `work` in a new unit of work
    pub async fn execute<T, F>(&self, work: F) -> Result<T, TransferError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut S::UnitOfWork) -> BoxFuture<'c, Result<T, TransferError>>
            + Send,
    {
        let deadline = self.timeout.map(|limit| (Instant::now() + limit, limit));

        let mut uow = match deadline {
            Some((at, limit)) => match tokio::time::timeout_at(at, self.store.begin()).await {
                Ok(begun) => begun.map_err(TransferError::Begin)?,
                Err(_) => {
                    warn!(timeout = ?limit, "No unit of work available before deadline");
                    return Err(TransferError::TimedOut(limit));
                }
            },
            None => self.store.begin().await.map_err(TransferError::Begin)?,
        };

        let outcome = match deadline {
            Some((at, limit)) => match tokio::time::timeout_at(at, work(&mut uow)).await {
                Ok(result) => result,
                Err(_) => Err(TransferError::TimedOut(limit)),
            },
            None => work(&mut uow).await,
        };

        match outcome {
            Ok(value) => {
                uow.commit().await.map_err(TransferError::Commit)?;
                debug!("Unit of work committed");
                Ok(value)
            }
            Err(cause) => match uow.rollback().await {
                Ok(()) => {
                    warn!(error = %cause, "Unit of work rolled back");
                    Err(cause)
                }
                Err(rollback) => {
                    error!(error = %cause, rollback_error = %rollback, "Rollback failed");
                    Err(TransferError::RollbackFailed {
                        cause: Box::new(cause),
                        rollback,
                    })
                }
            },
        }
    }
}
