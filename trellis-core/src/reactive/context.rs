//! Reactive Context
//!
//! The reactive context tracks which observer is currently running. This
//! enables automatic dependency tracking: when the store is read, the path
//! that was read is recorded against the running observer.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing observer.
//! When an observer starts, we push it onto the stack. When it completes, we
//! pop it. Nested observers (an observer that subscribes another observer
//! while running) each collect their own paths.

use std::cell::{Cell, RefCell};

use indexmap::IndexSet;

use super::ObserverId;
use crate::path::AccessPath;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };

    /// Depth of active [`ReactiveContext::untracked`] sections.
    static UNTRACKED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    observer_id: ObserverId,
    /// Paths read during this run, in first-read order, without duplicates.
    dependencies: IndexSet<AccessPath>,
}

/// Guard that pops the context when dropped.
///
/// Dropping during a panic still pops, so a failing observer never leaves
/// its entry on the stack.
pub struct ReactiveContext {
    observer_id: ObserverId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given observer.
    ///
    /// While this context is active, every tracked read records its path
    /// against the observer.
    pub fn enter(observer_id: ObserverId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer_id,
                dependencies: IndexSet::new(),
            });
        });

        Self { observer_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The observer currently running, if any.
    pub fn current_observer() -> Option<ObserverId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.observer_id))
    }

    /// Record a read of `path` against the current observer.
    pub fn track(path: &AccessPath) {
        if UNTRACKED_DEPTH.with(Cell::get) > 0 {
            return;
        }
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if !entry.dependencies.contains(path) {
                    entry.dependencies.insert(path.clone());
                }
            }
        });
    }

    /// The paths collected so far in the current context.
    pub fn dependencies() -> Vec<AccessPath> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Drain the paths collected so far in the current context.
    pub fn take_dependencies() -> Vec<AccessPath> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies).into_iter().collect())
                .unwrap_or_default()
        })
    }

    /// Run `f` without recording any reads.
    ///
    /// The current observer stays current, so read-only enforcement still
    /// applies inside.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        struct Restore;
        impl Drop for Restore {
            fn drop(&mut self) {
                UNTRACKED_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
            }
        }

        UNTRACKED_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let _restore = Restore;
        f()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.observer_id, self.observer_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.observer_id, entry.observer_id
                );
            }
        });
    }
}
