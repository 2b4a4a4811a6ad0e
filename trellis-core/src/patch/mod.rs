//! Patch Transaction Engine
//!
//! Applies ordered lists of `add`/`remove`/`replace`/`test` operations as one
//! all-or-nothing unit.
//!
//! # How It Works
//!
//! 1. Operations run in order against the live tree through the store, so
//!    successful steps are observed like any other write.
//!
//! 2. Before each step mutates, the inverse that undoes it is recorded.
//!
//! 3. If a `test` fails or a step errors, the recorded inverses run newest
//!    first and the tree ends structurally equal to where it started. The
//!    failure comes back in the [`PatchResult`], never as a panic or `Err`.
//!
//! 4. A successful transaction hands back a [`Rollback`] that can undo it
//!    later, touching only the paths it wrote.
//!
//! # Example
//!
//! ```rust,ignore
//! let result = store.patches().apply(&[
//!     PatchOperation::test("/ver", 10),
//!     PatchOperation::replace("/count", 2),
//! ]);
//! assert!(result.success);
//! result.rollback.rollback()?;
//! ```

mod op;
mod transaction;

use std::panic::{self, AssertUnwindSafe};

pub use op::PatchOperation;
pub use transaction::{Rollback, Transaction};

use crate::error::PatchError;
use crate::reactive::panic_message;
use crate::store::Store;

/// Outcome of one transaction.
#[derive(Debug)]
pub struct PatchResult {
    pub success: bool,
    /// Why the transaction failed.
    pub error: Option<PatchError>,
    /// Operations that had been applied when the transaction finished or
    /// failed. On failure they have all been undone again.
    pub applied_count: usize,
    /// Index of the operation that failed.
    pub failed_index: Option<usize>,
    /// Undo handle. Spent already when the transaction failed.
    pub rollback: Rollback,
}

impl PatchResult {
    /// Convert into a `Result`, keeping the rollback handle on success.
    pub fn into_result(self) -> Result<Rollback, PatchError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.rollback),
        }
    }
}

/// Outcome of a batch of transactions.
#[derive(Debug)]
pub struct BatchResult {
    pub success: bool,
    /// Index of the transaction that failed.
    pub failed_index: Option<usize>,
    /// One result per transaction attempted, in order.
    pub results: Vec<PatchResult>,
}

impl BatchResult {
    /// Undo every transaction in the batch, newest first.
    ///
    /// After a failed batch everything has been undone already and this
    /// does nothing.
    pub fn rollback_all(&self) -> Result<usize, PatchError> {
        let mut replayed = 0;
        for result in self.results.iter().rev() {
            replayed += result.rollback.rollback()?;
        }
        Ok(replayed)
    }
}

/// Entry point for patch transactions against one store.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    store: Store,
}

impl PatchEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Apply `ops` as one transaction.
    pub fn apply(&self, ops: &[PatchOperation]) -> PatchResult {
        let span = tracing::debug_span!("patch", ops = ops.len());
        let _enter = span.enter();

        let mut tx = Transaction::new(&self.store);
        for (index, op) in ops.iter().enumerate() {
            if let Err(error) = tx.apply_op(op) {
                tracing::debug!(index, op = op.name(), %error, "operation failed");
                return self.abandon(tx, error, index);
            }
        }

        tracing::debug!(applied = tx.applied(), "transaction applied");
        self.commit(tx)
    }

    /// Decode a JSON Patch document and apply it.
    pub fn apply_json(&self, document: &str) -> Result<PatchResult, PatchError> {
        let ops = PatchOperation::parse_document(document)?;
        Ok(self.apply(&ops))
    }

    /// Apply several transactions as one unit. On the first failure every
    /// transaction already applied is rolled back too.
    pub fn apply_batch<T>(&self, batch: &[T]) -> BatchResult
    where
        T: AsRef<[PatchOperation]>,
    {
        let mut results: Vec<PatchResult> = Vec::with_capacity(batch.len());

        for (index, ops) in batch.iter().enumerate() {
            let result = self.apply(ops.as_ref());
            let failed = !result.success;
            results.push(result);

            if failed {
                for earlier in results[..index].iter().rev() {
                    if let Err(err) = earlier.rollback.rollback() {
                        tracing::error!(%err, "batch rollback incomplete");
                    }
                }
                tracing::debug!(failed_index = index, "batch rolled back");
                return BatchResult {
                    success: false,
                    failed_index: Some(index),
                    results,
                };
            }
        }

        BatchResult {
            success: true,
            failed_index: None,
            results,
        }
    }

    /// Run a closure-driven transaction.
    ///
    /// Returning `Err` or panicking from `f` undoes every step it applied.
    pub fn run<F>(&self, f: F) -> PatchResult
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<(), PatchError>,
    {
        let mut tx = Transaction::new(&self.store);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut tx)));

        let error = match outcome {
            Ok(Ok(())) => return self.commit(tx),
            Ok(Err(error)) => error,
            Err(payload) => PatchError::Aborted(panic_message(payload)),
        };
        let index = tx.applied();
        tracing::debug!(index, %error, "transaction closure failed");
        self.abandon(tx, error, index)
    }

    fn commit(&self, tx: Transaction<'_>) -> PatchResult {
        let applied_count = tx.applied();
        PatchResult {
            success: true,
            error: None,
            applied_count,
            failed_index: None,
            rollback: Rollback::new(self.store.clone(), tx.into_inverses()),
        }
    }

    fn abandon(&self, tx: Transaction<'_>, error: PatchError, index: usize) -> PatchResult {
        let applied_count = tx.applied();
        if let Err(err) = transaction::unwind(&self.store, tx.into_inverses()) {
            tracing::error!(%err, "transaction rollback incomplete");
        }
        PatchResult {
            success: false,
            error: Some(error),
            applied_count,
            failed_index: Some(index),
            rollback: Rollback::spent(self.store.clone()),
        }
    }
}
