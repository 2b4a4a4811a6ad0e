//! Observable Store
//!
//! The store owns the tree and is the only way to change it. Every read goes
//! through [`Store::get`], which records the path against the running
//! observer; every write goes through [`Store::set`] or one of the array
//! operations, which records the written path into the pending change set
//! and schedules one flush for the batch.
//!
//! # Replacement
//!
//! There is no wrapping step to forget. Composites inserted by a write are
//! plain [`Node`](crate::value::Node)s that can only be changed through the
//! store, so an array that replaced another is exactly as observable as the
//! original. [`Cursor`] gives a path-bound handle that resolves its path on
//! every call and therefore always sees the current occupant.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = Store::new(json!({ "user": { "name": "Ada" } }));
//!
//! let _sub = store.subscribe(|s| {
//!     println!("name is {}", s.get("user.name"));
//! });
//!
//! store.set("user.name", "Grace")?;
//! store.flush();
//! ```

mod array;
mod cursor;
mod subscription;
mod tree;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::{FlushMode, StoreConfig};
use crate::error::{PathError, StoreError};
use crate::patch::PatchEngine;
use crate::path::{AccessPath, PathSegment};
use crate::reactive::{
    BatchScheduler, Execution, FlushReport, Observer, ObserverId, Phase, ReactiveContext,
    SubscriptionRegistry,
};
use crate::snapshot::{deep_equal, Snapshot};
use crate::value::Value;

pub use cursor::Cursor;
pub use subscription::Subscription;
pub(crate) use tree::first_missing;

pub(crate) struct StoreInner {
    root: RwLock<Value>,
    registry: SubscriptionRegistry,
    scheduler: BatchScheduler,
    read_only: Mutex<HashSet<ObserverId>>,
    config: StoreConfig,
    host_flush_logged: AtomicBool,
}

/// A reactive tree of values.
///
/// Cloning a `Store` yields another handle to the same tree.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// How one observer run ended.
enum RunOutcome {
    Skipped,
    Completed,
    Panicked,
}

impl Store {
    /// Create a store with the default configuration.
    pub fn new(initial: impl Into<Value>) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Create a store. A root that is not an object or an array is replaced
    /// by an empty object.
    pub fn with_config(initial: impl Into<Value>, config: StoreConfig) -> Self {
        let initial = initial.into();
        let root = if is_valid_root(&initial) {
            initial
        } else {
            tracing::warn!(kind = initial.kind_name(), "store root must be an object or an array; starting empty");
            Value::empty_object()
        };
        Self::from_parts(root, config)
    }

    /// Create a store, rejecting a root that is not an object or an array.
    pub fn try_with_config(initial: impl Into<Value>, config: StoreConfig) -> Result<Self, StoreError> {
        let initial = initial.into();
        if !is_valid_root(&initial) {
            return Err(StoreError::InvalidRoot);
        }
        Ok(Self::from_parts(initial, config))
    }

    fn from_parts(root: Value, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                root: RwLock::new(root),
                registry: SubscriptionRegistry::new(),
                scheduler: BatchScheduler::new(),
                read_only: Mutex::new(HashSet::new()),
                config,
                host_flush_logged: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn root(&self) -> Value {
        self.inner.root.read().clone()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Read the value at `path`, recording it as a dependency of the running
    /// observer. Missing paths read as [`Value::Undefined`].
    pub fn get(&self, path: impl Into<AccessPath>) -> Value {
        let path = path.into();
        ReactiveContext::track(&path);
        self.root().lookup(&path).unwrap_or_default()
    }

    /// Read without recording a dependency.
    pub fn peek(&self, path: impl Into<AccessPath>) -> Value {
        self.root().lookup(&path.into()).unwrap_or_default()
    }

    /// Whether `path` resolves. Tracked like [`Store::get`].
    pub fn contains(&self, path: impl Into<AccessPath>) -> bool {
        let path = path.into();
        ReactiveContext::track(&path);
        self.root().lookup(&path).is_some()
    }

    /// A path-bound handle into the store.
    pub fn at(&self, path: impl Into<AccessPath>) -> Cursor {
        Cursor::new(self.clone(), path.into())
    }

    /// An inert deep copy of the value at `path`.
    pub fn snapshot(&self, path: impl Into<AccessPath>) -> Snapshot {
        let path = path.into();
        let value = self.peek(&path);
        Snapshot::capture(path, &value)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Write `value` at `path`.
    ///
    /// Missing intermediates are created. A value deep-equal to the current
    /// one is stored without recording a change.
    pub fn set(&self, path: impl Into<AccessPath>, value: impl Into<Value>) -> Result<(), StoreError> {
        let path = path.into();
        let value = value.into();
        self.guard_write(&path)?;

        let Some((parent, segment)) = path.split_last() else {
            return self.replace_root(value);
        };

        let root = self.root();
        match root.lookup(&path) {
            Some(current) if deep_equal(&current, &value) => {
                tree::find_node(&root, &parent)?.put(&segment, value, &parent)?;
                return Ok(());
            }
            None if value.is_undefined() => return Ok(()),
            _ => {}
        }

        let changed = if writes_into_array(&root, &parent, &segment) {
            parent.clone()
        } else {
            path.clone()
        };

        self.write_tracked(changed, |root| {
            let node = tree::ensure_parent(root, &parent, &segment)?;
            node.put(&segment, value, &parent)?;
            Ok(())
        })
    }

    /// Read-modify-write. The read is not tracked.
    pub fn update<F>(&self, path: impl Into<AccessPath>, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(Value) -> Value,
    {
        let path = path.into();
        let current = self.peek(&path);
        self.set(path, f(current))
    }

    /// Remove the object key or array element at `path`.
    ///
    /// Returns the removed value, or `None` if there was nothing there.
    pub fn delete(&self, path: impl Into<AccessPath>) -> Result<Option<Value>, StoreError> {
        let path = path.into();
        match self.remove_entry(&path) {
            Ok((value, _)) => Ok(Some(value)),
            Err(StoreError::Path(PathError::Missing { .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Replace the whole tree.
    pub fn replace_root(&self, value: impl Into<Value>) -> Result<(), StoreError> {
        let value = value.into();
        let root_path = AccessPath::root();
        self.guard_write(&root_path)?;
        if !is_valid_root(&value) {
            return Err(StoreError::InvalidRoot);
        }

        if deep_equal(&self.root(), &value) {
            *self.inner.root.write() = value;
            return Ok(());
        }
        self.write_tracked(root_path, |_| {
            *self.inner.root.write() = value;
            Ok(())
        })
    }

    /// Remove the entry at `path`, returning it and its position in its
    /// parent. Array removals are recorded against the array.
    pub(crate) fn remove_entry(&self, path: &AccessPath) -> Result<(Value, usize), StoreError> {
        self.guard_write(path)?;
        let (parent, segment) = path.split_last().ok_or(PathError::RootRemoval)?;
        let root = self.root();
        let node = tree::find_node(&root, &parent).map_err(|err| match err {
            PathError::NotAContainer { .. } => err,
            _ => PathError::Missing { path: path.clone() },
        })?;
        if node.get(&segment).is_none() {
            return Err(PathError::Missing { path: path.clone() }.into());
        }

        let changed = if node.is_array() { parent.clone() } else { path.clone() };
        self.write_tracked(changed, |_| {
            node.remove(&segment, &parent)?
                .ok_or_else(|| StoreError::from(PathError::Missing { path: path.clone() }))
        })
    }

    /// Insert `value` under `parent` at `segment`, placing it at `position`.
    ///
    /// For arrays this shifts later elements up; for objects it restores a
    /// key at its former slot in key order.
    pub(crate) fn insert_entry(
        &self,
        parent: &AccessPath,
        segment: &PathSegment,
        position: usize,
        value: Value,
    ) -> Result<(), StoreError> {
        let path = parent.child(segment.clone());
        self.guard_write(&path)?;
        let node = tree::find_node(&self.root(), parent)?;

        let changed = if node.is_array() { parent.clone() } else { path };
        self.write_tracked(changed, |_| {
            node.insert_at(segment, position, value, parent)?;
            Ok(())
        })
    }

    /// Record `changed` into the pending set, apply `mutate`, and schedule
    /// a flush. The record is withdrawn if `mutate` fails.
    fn write_tracked<R>(
        &self,
        changed: AccessPath,
        mutate: impl FnOnce(&Value) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let root = self.root();
        let scheduler = &self.inner.scheduler;

        let fresh = !scheduler.is_pending(&changed) && {
            let before = self.inner.config.verify_changes.then(|| {
                Snapshot::capture(changed.clone(), &root.lookup(&changed).unwrap_or_default())
            });
            scheduler.record(changed.clone(), before)
        };

        match mutate(&root) {
            Ok(result) => {
                tracing::trace!(path = %changed, "write");
                self.schedule_flush();
                Ok(result)
            }
            Err(err) => {
                if fresh {
                    scheduler.forget(&changed);
                }
                Err(err)
            }
        }
    }

    fn guard_write(&self, path: &AccessPath) -> Result<(), StoreError> {
        if !self.inner.config.reject_render_writes {
            return Ok(());
        }
        let Some(observer) = ReactiveContext::current_observer() else {
            return Ok(());
        };
        if self.inner.read_only.lock().contains(&observer) {
            tracing::warn!(%observer, %path, "write rejected during render");
            return Err(StoreError::ReadOnly {
                observer,
                path: path.clone(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    /// Attach `value` under `key` in the hidden key space of the composite
    /// at `path`. Never recorded, never observed, never rejected.
    pub fn set_meta(
        &self,
        path: impl Into<AccessPath>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, StoreError> {
        let node = tree::find_node(&self.root(), &path.into())?;
        Ok(node.set_meta(key.into(), value.into()))
    }

    pub fn meta(&self, path: impl Into<AccessPath>, key: &str) -> Option<Value> {
        tree::find_node(&self.root(), &path.into())
            .ok()
            .and_then(|node| node.meta(key))
    }

    pub fn remove_meta(&self, path: impl Into<AccessPath>, key: &str) -> Option<Value> {
        tree::find_node(&self.root(), &path.into())
            .ok()
            .and_then(|node| node.remove_meta(key))
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    /// Register an effect observer and run it once to collect its
    /// dependencies.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.register(Phase::Effect, callback)
    }

    /// Register a render observer. Writes it makes while running are
    /// rejected.
    pub fn subscribe_render<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.register(Phase::Render, callback)
    }

    fn register<F>(&self, phase: Phase, callback: F) -> Subscription
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        let observer = Arc::new(Observer::new(phase, callback));
        let id = self.inner.registry.register(Arc::clone(&observer));
        tracing::debug!(observer = %id, ?phase, "observer registered");
        self.run_observer(&observer);
        Subscription::new(id, self)
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.inner.read_only.lock().remove(&id);
        let removed = self.inner.registry.unregister(id).is_some();
        if removed {
            tracing::debug!(observer = %id, "observer removed");
        }
        removed
    }

    /// Reject writes made while `id` is the running observer. Returns
    /// whether the observer was not already marked.
    pub fn mark_read_only(&self, id: ObserverId) -> bool {
        self.inner.read_only.lock().insert(id)
    }

    pub fn clear_read_only(&self, id: ObserverId) -> bool {
        self.inner.read_only.lock().remove(&id)
    }

    pub fn is_read_only(&self, id: ObserverId) -> bool {
        self.inner.read_only.lock().contains(&id)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// The paths `id` read on its last run.
    pub fn dependencies_of(&self, id: ObserverId) -> Vec<AccessPath> {
        self.inner.registry.dependencies(id)
    }

    fn run_observer(&self, observer: &Observer) -> RunOutcome {
        let id = observer.id();
        let marked = observer.phase() == Phase::Render && self.mark_read_only(id);
        let execution = observer.execute(self);
        if marked {
            self.clear_read_only(id);
        }

        match execution {
            Execution::Skipped => RunOutcome::Skipped,
            Execution::Ran {
                dependencies,
                panic,
            } => {
                self.inner.registry.subscribe(id, dependencies);
                match panic {
                    Some(message) => {
                        tracing::error!(observer = %id, %message, "observer panicked");
                        RunOutcome::Panicked
                    }
                    None => RunOutcome::Completed,
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Flushing
    // ------------------------------------------------------------------------

    fn schedule_flush(&self) {
        if !self.inner.scheduler.claim() {
            return;
        }
        let mode = self.inner.config.flush_mode;
        if mode == FlushMode::Manual {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.clone();
                handle.spawn(async move {
                    tokio::task::yield_now().await;
                    store.flush();
                });
            }
            Err(_) if mode == FlushMode::Tokio => {
                tracing::warn!("tokio flush mode without a running runtime; flush left to the host");
            }
            Err(_) => {
                if !self.inner.host_flush_logged.swap(true, Ordering::Relaxed) {
                    tracing::debug!("no tokio runtime; pending changes wait for Store::flush");
                }
            }
        }
    }

    /// Deliver the pending batch.
    ///
    /// The pending set is drained before any observer runs, so writes made
    /// by observers form the next batch.
    pub fn flush(&self) -> FlushReport {
        let span = tracing::debug_span!("flush");
        let _enter = span.enter();

        let pending = self.inner.scheduler.drain();
        let mut report = FlushReport {
            passes: 1,
            ..Default::default()
        };

        let root = self.root();
        for (path, change) in pending {
            let unchanged = change
                .before
                .as_ref()
                .is_some_and(|before| before.matches(&root.lookup(&path).unwrap_or_default()));
            if unchanged {
                report.suppressed.push(path);
            } else {
                report.changed.push(path);
            }
        }

        let affected = self.inner.registry.resolve_all(&report.changed);
        for id in affected {
            let Some(observer) = self.inner.registry.observer(id) else {
                continue;
            };
            match self.run_observer(&observer) {
                RunOutcome::Skipped => {}
                RunOutcome::Completed => report.notified.push(id),
                RunOutcome::Panicked => {
                    report.notified.push(id);
                    report.failed.push(id);
                }
            }
        }

        tracing::debug!(
            changed = report.changed.len(),
            suppressed = report.suppressed.len(),
            notified = report.notified.len(),
            failed = report.failed.len(),
            "flush complete"
        );
        self.inner.scheduler.notify_if_idle();
        report
    }

    /// Flush repeatedly until nothing is pending, up to
    /// [`StoreConfig::max_flush_passes`] passes.
    pub fn flush_until_idle(&self) -> FlushReport {
        let mut total = FlushReport::default();
        for _ in 0..self.inner.config.max_flush_passes {
            total.absorb(self.flush());
            if !self.inner.scheduler.has_pending() {
                return total;
            }
        }
        tracing::warn!(
            passes = self.inner.config.max_flush_passes,
            pending = ?self.inner.scheduler.pending_paths(),
            "flush pass limit reached"
        );
        total
    }

    /// Resolve once no flush is scheduled and nothing is pending.
    ///
    /// In manual mode this waits for the host to flush.
    pub async fn when_idle(&self) {
        self.inner.scheduler.idle_notified().await;
    }

    pub fn has_pending(&self) -> bool {
        self.inner.scheduler.has_pending()
    }

    /// Paths written since the last flush, in first-write order.
    pub fn pending_changes(&self) -> Vec<AccessPath> {
        self.inner.scheduler.pending_paths()
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// The patch transaction engine for this store.
    pub fn patches(&self) -> PatchEngine {
        PatchEngine::new(self.clone())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("root", &*self.inner.root.read())
            .field("observers", &self.inner.registry.len())
            .field("pending", &self.inner.scheduler.pending_paths())
            .finish()
    }
}

fn is_valid_root(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Whether writing `segment` under `parent` lands in an array element,
/// either of an existing array or of one the write would create.
fn writes_into_array(root: &Value, parent: &AccessPath, segment: &PathSegment) -> bool {
    match root.lookup(parent) {
        Some(Value::Composite(node)) => node.is_array(),
        Some(Value::Undefined) | None => matches!(segment, PathSegment::Index(_)),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    fn manual(initial: serde_json::Value) -> Store {
        Store::with_config(initial, StoreConfig::manual())
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (runs.clone(), runs)
    }

    #[test]
    fn reads_of_missing_paths_are_undefined() {
        let store = manual(json!({ "a": { "b": 1 } }));

        assert_eq!(store.get("a.b"), Value::from(1));
        assert!(store.get("a.x.y").is_undefined());
        assert!(store.contains("a.b"));
        assert!(!store.contains("a.c"));
    }

    #[test]
    fn set_creates_intermediates() {
        let store = manual(json!({}));
        store.set("a.b[1].c", true).unwrap();

        assert_eq!(
            store.peek("").to_json().unwrap(),
            json!({ "a": { "b": [null, { "c": true }] } })
        );
        assert!(store.peek("a.b[0]").is_undefined());
    }

    #[test]
    fn set_far_past_the_end_of_an_array_fails_cleanly() {
        let store = manual(json!({ "items": [] }));

        let err = store.set("items[18446744073709551615]", 1).unwrap_err();
        assert!(matches!(err, StoreError::Path(PathError::OutOfBounds { .. })));

        let err = store.set("items[10000000000].name", "x").unwrap_err();
        assert!(matches!(err, StoreError::Path(PathError::OutOfBounds { .. })));

        assert!(!store.has_pending());
        assert_eq!(store.peek("items"), json!([]));

        store.set("items[2]", 1).unwrap();
        assert_eq!(store.pending_changes(), vec![AccessPath::from("items")]);
    }

    #[traced_test]
    #[test]
    fn auto_mode_without_runtime_logs_the_fallback_once() {
        let store = Store::new(json!({ "n": 0 }));
        store.set("n", 1).unwrap();
        store.flush();
        store.set("n", 2).unwrap();

        assert!(store.has_pending());
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("pending changes wait for Store::flush"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one fallback message, saw {n}")),
            }
        });
    }

    #[test]
    fn set_into_a_scalar_fails_without_recording() {
        let store = manual(json!({ "a": 1 }));
        let err = store.set("a.b", 2).unwrap_err();

        assert!(matches!(err, StoreError::Path(PathError::NotAContainer { .. })));
        assert!(!store.has_pending());
    }

    #[test]
    fn element_writes_are_recorded_against_the_array() {
        let store = manual(json!({ "items": [1, 2] }));
        store.set("items[0]", 5).unwrap();
        store.set("items.1", 6).unwrap();

        assert_eq!(store.pending_changes(), vec![AccessPath::from("items")]);
        assert_eq!(store.peek("items"), json!([5, 6]));
    }

    #[test]
    fn equal_writes_are_not_recorded() {
        let store = manual(json!({ "cfg": { "theme": "dark", "admin": true } }));
        store
            .set("cfg", json!({ "admin": true, "theme": "dark" }))
            .unwrap();

        assert!(!store.has_pending());
    }

    #[test]
    fn delete_shifts_array_elements() {
        let store = manual(json!({ "items": ["a", "b", "c"], "o": { "k": 1 } }));

        assert_eq!(store.delete("items[1]").unwrap(), Some(Value::from("b")));
        assert_eq!(store.delete("o.k").unwrap(), Some(Value::from(1)));
        assert_eq!(store.delete("o.missing").unwrap(), None);
        assert!(matches!(
            store.delete(""),
            Err(StoreError::Path(PathError::RootRemoval))
        ));

        assert_eq!(store.peek(""), json!({ "items": ["a", "c"], "o": {} }));
        assert_eq!(
            store.pending_changes(),
            vec![AccessPath::from("items"), AccessPath::from("o.k")]
        );
    }

    #[test]
    fn flush_runs_each_affected_observer_once() {
        let store = manual(json!({ "a": 0, "b": 0 }));
        let (runs, seen) = counter();
        let _sub = store.subscribe(move |s| {
            s.get("a");
            s.get("b");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        let report = store.flush();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(report.notified.len(), 1);
        assert_eq!(report.changed.len(), 2);
    }

    #[test]
    fn changes_undone_within_a_batch_are_suppressed() {
        let store = manual(json!({ "a": 0 }));
        let (runs, seen) = counter();
        let _sub = store.subscribe(move |s| {
            s.get("a");
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.set("a", 1).unwrap();
        store.set("a", 0).unwrap();
        let report = store.flush();

        assert_eq!(report.suppressed, vec![AccessPath::from("a")]);
        assert!(report.notified.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn verification_can_be_disabled() {
        let store = Store::with_config(
            json!({ "a": 0 }),
            StoreConfig::manual().with_verify_changes(false),
        );
        store.set("a", 1).unwrap();
        store.set("a", 0).unwrap();

        assert_eq!(store.flush().changed, vec![AccessPath::from("a")]);
    }

    #[test]
    fn render_writes_are_rejected() {
        let store = manual(json!({ "n": 1 }));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let sub = store.subscribe_render(move |s| {
            s.get("n");
            if let Err(err) = s.set("n", 99) {
                sink.lock().push(err);
            }
        });

        assert_eq!(store.peek("n"), Value::from(1));
        assert_eq!(errors.lock().len(), 1);
        assert!(matches!(errors.lock()[0], StoreError::ReadOnly { .. }));
        assert!(!store.is_read_only(sub.id()));
        assert!(!store.has_pending());
    }

    #[test]
    fn effects_may_write_into_the_next_batch() {
        let store = manual(json!({ "a": 0, "doubled": 0 }));
        let _sub = store.subscribe(|s| {
            let a = s.get("a").as_f64().unwrap_or(0.0);
            s.set("doubled", a * 2.0).unwrap();
        });
        assert!(!store.has_pending());

        store.set("a", 4).unwrap();
        let first = store.flush();
        assert_eq!(first.changed, vec![AccessPath::from("a")]);
        assert_eq!(store.pending_changes(), vec![AccessPath::from("doubled")]);

        let rest = store.flush_until_idle();
        assert_eq!(rest.changed, vec![AccessPath::from("doubled")]);
        assert_eq!(store.peek("doubled"), Value::from(8));
    }

    #[test]
    fn flush_until_idle_stops_at_the_pass_limit() {
        let store = Store::with_config(
            json!({ "n": 0 }),
            StoreConfig::manual().with_max_flush_passes(3),
        );
        let _sub = store.subscribe(|s| {
            let n = s.get("n").as_f64().unwrap_or(0.0);
            s.set("n", n + 1.0).unwrap();
        });

        let report = store.flush_until_idle();
        assert_eq!(report.passes, 3);
        assert!(store.has_pending());
    }

    #[test]
    fn metadata_bypasses_change_tracking() {
        let store = manual(json!({ "node": {} }));
        let _sub = store.subscribe(|s| {
            s.get("node");
        });

        assert_eq!(store.set_meta("node", "owner", "panel").unwrap(), None);
        assert!(!store.has_pending());
        assert_eq!(store.meta("node", "owner"), Some(Value::from("panel")));
        assert_eq!(store.peek("node"), json!({}));
        assert_eq!(store.remove_meta("node", "owner"), Some(Value::from("panel")));
        assert!(store.set_meta("missing", "k", 1).is_err());
    }

    #[test]
    fn invalid_roots() {
        assert!(matches!(
            Store::try_with_config(Value::from(1), StoreConfig::manual()),
            Err(StoreError::InvalidRoot)
        ));
        let store = Store::with_config(Value::from("text"), StoreConfig::manual());
        assert_eq!(store.peek(""), json!({}));
        assert!(matches!(store.set("", 3), Err(StoreError::InvalidRoot)));
    }

    #[test]
    fn root_replacement_is_a_change_at_the_root() {
        let store = manual(json!({ "a": 1 }));
        store.set("", json!({ "a": 2 })).unwrap();

        assert_eq!(store.pending_changes(), vec![AccessPath::root()]);
        assert_eq!(store.peek("a"), Value::from(2));
    }

    #[test]
    fn store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Store>();
    }
}
