//! Path-bound handles.

use std::fmt;

use super::Store;
use crate::error::StoreError;
use crate::path::{AccessPath, PathSegment};
use crate::snapshot::Snapshot;
use crate::value::Value;

/// A handle to one location in a [`Store`].
///
/// A cursor holds a path, not a value. Every call resolves the path against
/// the current tree, so a cursor taken before its target was replaced
/// operates on the replacement. Reads are tracked exactly like
/// [`Store::get`].
///
/// # Example
///
/// ```rust,ignore
/// let items = store.at("items");
/// store.set("items", json!([]))?;
/// items.push(["still observed"])?;
/// ```
#[derive(Clone)]
pub struct Cursor {
    store: Store,
    path: AccessPath,
}

impl Cursor {
    pub(crate) fn new(store: Store, path: AccessPath) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &AccessPath {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A cursor one level deeper.
    pub fn child(&self, segment: impl Into<PathSegment>) -> Cursor {
        Cursor::new(self.store.clone(), self.path.child(segment))
    }

    /// A cursor at `relative` below this one.
    pub fn at(&self, relative: impl Into<AccessPath>) -> Cursor {
        Cursor::new(self.store.clone(), self.path.join(&relative.into()))
    }

    /// A cursor at the parent location, or `None` at the root.
    pub fn parent(&self) -> Option<Cursor> {
        self.path
            .parent()
            .map(|path| Cursor::new(self.store.clone(), path))
    }

    pub fn get(&self) -> Value {
        self.store.get(&self.path)
    }

    pub fn peek(&self) -> Value {
        self.store.peek(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.store.contains(&self.path)
    }

    /// Element or key count of the current value. Tracked.
    pub fn len(&self) -> Option<usize> {
        self.get().len()
    }

    /// Object keys of the current value. Tracked.
    pub fn keys(&self) -> Vec<String> {
        self.get().as_node().map(|node| node.keys()).unwrap_or_default()
    }

    pub fn set(&self, value: impl Into<Value>) -> Result<(), StoreError> {
        self.store.set(&self.path, value)
    }

    pub fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(Value) -> Value,
    {
        self.store.update(&self.path, f)
    }

    pub fn delete(&self) -> Result<Option<Value>, StoreError> {
        self.store.delete(&self.path)
    }

    pub fn push<I>(&self, values: I) -> Result<usize, StoreError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.store.push(&self.path, values)
    }

    pub fn pop(&self) -> Result<Option<Value>, StoreError> {
        self.store.pop(&self.path)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot(&self.path)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("path", &self.path)
            .field("value", &self.store.peek(&self.path))
            .finish()
    }
}
