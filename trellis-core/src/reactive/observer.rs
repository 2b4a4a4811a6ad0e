//! Observer types for the reactive system.
//!
//! An Observer is a callback plus the paths it read during its last run. The
//! paths are not declared; they are inferred from the reads made while the
//! callback executes inside a [`ReactiveContext`].
//!
//! # Phases
//!
//! - [`Phase::Effect`] observers may write to the store. Their writes join the
//!   next batch rather than the one being flushed.
//! - [`Phase::Render`] observers are read-only while they run. A write from a
//!   render is rejected so that a renderer cannot retrigger itself.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::ReactiveContext;
use crate::path::AccessPath;
use crate::store::Store;

/// Unique identifier for an observer.
///
/// Ids increase monotonically, so ordering by id is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an observer's invocation is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Side-effecting observer; writes are allowed.
    Effect,
    /// Rendering observer; writes are rejected while it runs.
    Render,
}

/// The callback type stored by observers.
pub type ObserverFn = dyn Fn(&Store) + Send + Sync;

/// The outcome of one observer invocation.
#[derive(Debug)]
pub(crate) enum Execution {
    /// The observer was disposed and did not run.
    Skipped,
    /// The observer ran. `panic` holds the panic message if it failed.
    Ran {
        dependencies: Vec<AccessPath>,
        panic: Option<String>,
    },
}

/// A registered callback.
pub struct Observer {
    id: ObserverId,
    phase: Phase,
    callback: Arc<ObserverFn>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl Observer {
    pub fn new<F>(phase: Phase, callback: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        Self {
            id: ObserverId::new(),
            phase,
            callback: Arc::new(callback),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Dispose of the observer.
    ///
    /// After disposal, the observer will not run again.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the observer has run.
    pub fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    /// Run the callback inside a fresh reactive context.
    ///
    /// A panic in the callback is caught; the paths read before the panic are
    /// still returned so the observer keeps receiving notifications.
    pub(crate) fn execute(&self, store: &Store) -> Execution {
        if self.is_disposed() {
            return Execution::Skipped;
        }

        let ctx = ReactiveContext::enter(self.id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(store)));
        let dependencies = ReactiveContext::take_dependencies();
        drop(ctx);

        self.run_count.fetch_add(1, Ordering::SeqCst);

        Execution::Ran {
            dependencies,
            panic: outcome.err().map(panic_message),
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
