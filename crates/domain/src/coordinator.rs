//! Runs units of work against the store under a deadline.

use std::future::Future;
use std::time::Duration;

use store::{Store, StoreTx};

use crate::error::DomainError;

/// Default deadline for one atomic unit.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Hands out transactions and bounds how long a unit of work may hold one.
///
/// A unit that overruns its deadline is cancelled: its future is dropped
/// together with the open transaction, which rolls the transaction back.
#[derive(Clone)]
pub struct Coordinator<S: Store> {
    store: S,
    deadline: Duration,
}

impl<S: Store> Coordinator<S> {
    pub fn new(store: S) -> Self {
        Self::with_deadline(store, DEFAULT_DEADLINE)
    }

    pub fn with_deadline(store: S, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Begins a transaction.
    pub async fn begin(&self) -> Result<Box<dyn StoreTx>, DomainError> {
        Ok(self.store.begin().await?)
    }

    /// Runs `work` to completion or until the deadline expires.
    pub async fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match tokio::time::timeout(self.deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, deadline = ?self.deadline, "unit of work timed out");
                Err(DomainError::Timeout {
                    operation,
                    after: self.deadline,
                })
            }
        }
    }
}

/// Commits `tx` if `result` is a success, otherwise rolls it back.
pub(crate) async fn settle<T>(
    tx: Box<dyn StoreTx>,
    result: Result<T, DomainError>,
) -> Result<T, DomainError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => abort(tx, err).await,
    }
}

/// Rolls back `tx` and returns `err`.
///
/// A failed rollback is only logged: the transaction is gone either way and
/// the caller needs the original error.
pub(crate) async fn abort<T>(
    tx: Box<dyn StoreTx>,
    err: impl Into<DomainError>,
) -> Result<T, DomainError> {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::warn!(error = %rollback_err, "rollback failed");
    }
    Err(err.into())
}
