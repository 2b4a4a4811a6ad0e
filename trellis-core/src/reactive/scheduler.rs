//! Batching Scheduler
//!
//! The scheduler owns the pending change set: the paths written since the
//! last flush, each with a snapshot of its value before the first write of
//! the batch. It does not run observers itself; the store drains it and
//! drives the flush.
//!
//! # Batching
//!
//! 1. The first write of an idle turn records its path and claims the flush.
//!    Claiming returns `true` exactly once per batch, so only that write
//!    schedules a deferred flush.
//! 2. Later writes in the same turn only add paths.
//! 3. The flush drains the set and releases the claim in one step, so writes
//!    made by observers during the flush start a new batch.

use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::observer::ObserverId;
use crate::path::AccessPath;
use crate::snapshot::Snapshot;

/// One entry of the pending change set.
#[derive(Debug, Clone)]
pub struct PendingChange {
    /// The value at the path before the first write of this batch. Absent
    /// when change verification is off.
    pub before: Option<Snapshot>,
}

/// What a flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Paths that were delivered to observers.
    pub changed: Vec<AccessPath>,
    /// Paths dropped because they ended the batch equal to where they started.
    pub suppressed: Vec<AccessPath>,
    /// Observers that ran, in creation order.
    pub notified: Vec<ObserverId>,
    /// Observers whose callback panicked.
    pub failed: Vec<ObserverId>,
    /// Number of flush passes folded into this report.
    pub passes: usize,
}

impl FlushReport {
    /// Whether the flush had nothing to deliver.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.notified.is_empty()
    }

    pub(crate) fn absorb(&mut self, other: FlushReport) {
        self.changed.extend(other.changed);
        self.suppressed.extend(other.suppressed);
        self.notified.extend(other.notified);
        self.failed.extend(other.failed);
        self.passes += other.passes;
    }
}

/// Pending change set plus the single-flush claim.
#[derive(Debug, Default)]
pub struct BatchScheduler {
    pending: Mutex<IndexMap<AccessPath, PendingChange>>,
    scheduled: AtomicBool,
    idle: Notify,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `path` to the pending set.
    ///
    /// The first record of a path in a batch keeps its snapshot; later
    /// records of the same path are absorbed. Returns whether the path was
    /// newly added.
    pub fn record(&self, path: AccessPath, before: Option<Snapshot>) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains_key(&path) {
            return false;
        }
        tracing::trace!(%path, "change recorded");
        pending.insert(path, PendingChange { before });
        true
    }

    /// Drop a path recorded by a write that then failed.
    pub fn forget(&self, path: &AccessPath) {
        self.pending.lock().shift_remove(path);
    }

    pub fn is_pending(&self, path: &AccessPath) -> bool {
        self.pending.lock().contains_key(path)
    }

    /// Claim the flush for this batch. Returns `true` for the first caller
    /// only; that caller is responsible for scheduling it.
    pub fn claim(&self) -> bool {
        !self.scheduled.swap(true, Ordering::AcqRel)
    }

    /// Take the pending set and release the claim.
    pub fn drain(&self) -> IndexMap<AccessPath, PendingChange> {
        let mut pending = self.pending.lock();
        self.scheduled.store(false, Ordering::Release);
        std::mem::take(&mut *pending)
    }

    /// Whether a flush has been claimed and not yet drained.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// The pending paths in first-write order.
    pub fn pending_paths(&self) -> Vec<AccessPath> {
        self.pending.lock().keys().cloned().collect()
    }

    pub fn is_idle(&self) -> bool {
        !self.is_scheduled() && !self.has_pending()
    }

    /// Wake every `idle_notified` waiter if nothing is left to flush.
    pub fn notify_if_idle(&self) {
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }

    /// Resolve once the scheduler is idle.
    pub async fn idle_notified(&self) {
        loop {
            let notified = self.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
