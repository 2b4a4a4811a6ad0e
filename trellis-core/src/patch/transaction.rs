//! Transactions and their inverses.
//!
//! A [`Transaction`] applies operations one at a time through the store and
//! records, for each one, the inverse that undoes it. Inverses carry
//! snapshots rather than live values, so replaying one always inserts a
//! fresh copy and never aliases the tree.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::op::PatchOperation;
use crate::error::{PatchError, PathError, StoreError};
use crate::path::{AccessPath, PathSegment};
use crate::snapshot::{deep_equal, Snapshot};
use crate::store::Store;
use crate::value::Value;

/// The undo action for one applied operation.
#[derive(Debug, Clone)]
pub(crate) enum Inverse {
    /// Remove what an `add` created.
    Remove { path: AccessPath },
    /// Put a previous value back in place.
    Restore { before: Snapshot },
    /// Re-insert a removed entry at its former position.
    Reinsert {
        parent: AccessPath,
        segment: PathSegment,
        position: usize,
        before: Snapshot,
    },
}

impl Inverse {
    fn replay(&self, store: &Store) -> Result<(), StoreError> {
        match self {
            Self::Remove { path } => store.remove_entry(path).map(|_| ()),
            Self::Restore { before } => store.set(before.path(), before.to_value()),
            Self::Reinsert {
                parent,
                segment,
                position,
                before,
            } => store.insert_entry(parent, segment, *position, before.to_value()),
        }
    }
}

/// Replay `actions` newest first. Every action is attempted; the first
/// failure is returned after the rest have run.
pub(crate) fn unwind(store: &Store, actions: Vec<Inverse>) -> Result<usize, PatchError> {
    let mut replayed = 0;
    let mut first_error = None;
    for action in actions.into_iter().rev() {
        match action.replay(store) {
            Ok(()) => replayed += 1,
            Err(err) => {
                tracing::warn!(?action, %err, "inverse failed to replay");
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(replayed),
    }
}

/// An in-progress patch transaction.
///
/// Obtained from [`PatchEngine::run`](super::PatchEngine::run). Each
/// successful step is applied to the live tree immediately; if the closure
/// fails, every step is undone newest first.
pub struct Transaction<'s> {
    store: &'s Store,
    undo: Vec<Inverse>,
    applied: usize,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(store: &'s Store) -> Self {
        Self {
            store,
            undo: Vec::new(),
            applied: 0,
        }
    }

    /// Number of operations applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    pub(crate) fn into_inverses(self) -> Vec<Inverse> {
        self.undo
    }

    /// Apply one wire-format operation.
    pub fn apply_op(&mut self, op: &PatchOperation) -> Result<(), PatchError> {
        let path = op.path()?;
        match op {
            PatchOperation::Add { value, .. } => self.add(&path, value.clone()),
            PatchOperation::Remove { .. } => self.remove(&path),
            PatchOperation::Replace { value, .. } => self.replace(&path, value.clone()),
            PatchOperation::Test { value, .. } => self.test(&path, value),
        }
    }

    /// Add `value` at `path`.
    ///
    /// Into an array this inserts (shifting later elements); `-` or an index
    /// equal to the length appends. Into an object it sets the key. Missing
    /// parents are created and removed again on rollback.
    pub fn add(&mut self, path: &AccessPath, value: impl Into<Value>) -> Result<(), PatchError> {
        let value = value.into();
        let Some((parent, segment)) = path.split_last() else {
            let before = self.store.snapshot(AccessPath::root());
            self.store.replace_root(value)?;
            return self.done(Inverse::Restore { before });
        };

        match self.store.peek(&parent) {
            Value::Composite(node) if node.is_array() => {
                let len = node.len();
                let index = if segment.is_append() {
                    len
                } else {
                    segment.as_index().ok_or_else(|| {
                        execution("add", path, format!("`{segment}` is not an array index"))
                    })?
                };
                if index > len {
                    return Err(execution(
                        "add",
                        path,
                        format!("index {index} is out of bounds (length {len})"),
                    ));
                }
                self.store
                    .insert_entry(&parent, &PathSegment::Index(index), index, value)?;
                self.done(Inverse::Remove {
                    path: parent.child(index),
                })
            }
            Value::Composite(node) if node.is_object() => {
                let inverse = match node.get(&segment) {
                    Some(existing) => Inverse::Restore {
                        before: Snapshot::capture(path.clone(), &existing),
                    },
                    None => Inverse::Remove { path: path.clone() },
                };
                self.store.set(path, value)?;
                self.done(inverse)
            }
            Value::Undefined => {
                let created = self.creatable_ancestor(path)?;
                self.store.set(path, value)?;
                self.done(Inverse::Remove { path: created })
            }
            other => Err(execution(
                "add",
                path,
                format!("parent holds {}, which cannot take children", other.kind_name()),
            )),
        }
    }

    /// Remove the existing value at `path`.
    pub fn remove(&mut self, path: &AccessPath) -> Result<(), PatchError> {
        let Some((parent, segment)) = path.split_last() else {
            return Err(PathError::RootRemoval.into());
        };
        let before = self.store.snapshot(path);
        let (_, position) = self
            .store
            .remove_entry(path)
            .map_err(|err| missing_to_execution("remove", path, err))?;
        self.done(Inverse::Reinsert {
            parent,
            segment,
            position,
            before,
        })
    }

    /// Overwrite the existing value at `path`.
    pub fn replace(&mut self, path: &AccessPath, value: impl Into<Value>) -> Result<(), PatchError> {
        let value = value.into();
        if !self.exists(path) {
            return Err(execution("replace", path, "path does not exist"));
        }
        let before = self.store.snapshot(path);
        self.store.set(path, value)?;
        self.done(Inverse::Restore { before })
    }

    /// Assert the value at `path` deep-equals `expected`.
    pub fn test(&mut self, path: &AccessPath, expected: &Value) -> Result<(), PatchError> {
        let actual = self.store.peek(path);
        if !deep_equal(&actual, expected) {
            return Err(PatchError::TestFailed {
                path: path.clone(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        self.applied += 1;
        Ok(())
    }

    fn done(&mut self, inverse: Inverse) -> Result<(), PatchError> {
        self.undo.push(inverse);
        self.applied += 1;
        Ok(())
    }

    fn exists(&self, path: &AccessPath) -> bool {
        match path.split_last() {
            None => true,
            Some((parent, segment)) => self.store.peek(&parent).child(&segment).is_some(),
        }
    }

    /// The outermost ancestor of `path` that an `add` would create.
    ///
    /// Creating an element inside an existing array is only allowed as an
    /// append, so that removing it restores the array exactly.
    fn creatable_ancestor(&self, path: &AccessPath) -> Result<AccessPath, PatchError> {
        let root = self.store.peek(AccessPath::root());
        let created = crate::store::first_missing(&root, path)
            .ok_or_else(|| execution("add", path, "parent does not exist"))?;

        if let Some((holder, segment)) = created.split_last() {
            if let Value::Composite(node) = self.store.peek(&holder) {
                if node.is_array() && segment.as_index() != Some(node.len()) {
                    return Err(execution(
                        "add",
                        path,
                        format!("`{created}` would leave a gap in the array at `{holder}`"),
                    ));
                }
            }
        }
        Ok(created)
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("applied", &self.applied)
            .field("inverses", &self.undo.len())
            .finish()
    }
}

fn execution(op: &'static str, path: &AccessPath, reason: impl Into<String>) -> PatchError {
    PatchError::Execution {
        op,
        path: path.clone(),
        reason: reason.into(),
    }
}

fn missing_to_execution(op: &'static str, path: &AccessPath, err: StoreError) -> PatchError {
    match err {
        StoreError::Path(PathError::Missing { .. }) => execution(op, path, "path does not exist"),
        other => other.into(),
    }
}

/// Undo handle for an applied transaction.
///
/// The first call to [`Rollback::rollback`] replays the inverses; later calls
/// (on this handle or any clone of it) do nothing.
#[derive(Clone)]
pub struct Rollback {
    store: Store,
    actions: Arc<Mutex<Option<Vec<Inverse>>>>,
}

impl Rollback {
    pub(crate) fn new(store: Store, actions: Vec<Inverse>) -> Self {
        Self {
            store,
            actions: Arc::new(Mutex::new(Some(actions))),
        }
    }

    /// A handle with nothing to undo.
    pub(crate) fn spent(store: Store) -> Self {
        Self {
            store,
            actions: Arc::new(Mutex::new(None)),
        }
    }

    /// Undo the transaction. Returns the number of inverses replayed; `0`
    /// once the handle has been used.
    pub fn rollback(&self) -> Result<usize, PatchError> {
        let Some(actions) = self.actions.lock().take() else {
            return Ok(0);
        };
        let count = actions.len();
        let replayed = unwind(&self.store, actions)?;
        tracing::debug!(replayed, of = count, "transaction rolled back");
        Ok(replayed)
    }

    /// Whether the handle has been used (or never had anything to undo).
    pub fn is_spent(&self) -> bool {
        self.actions.lock().is_none()
    }
}

impl fmt::Debug for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self.actions.lock().as_ref().map(Vec::len);
        f.debug_struct("Rollback").field("pending", &pending).finish()
    }
}
