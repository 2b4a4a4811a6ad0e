//! Array operations.
//!
//! Each operation is a write to the array's own path, never to an index, so
//! an observer of the array sees every structural change. Operations that
//! cannot change anything (popping an empty array, splicing nothing) return
//! early without recording.

use super::Store;
use crate::error::StoreError;
use crate::path::AccessPath;
use crate::value::{Composite, Node, Value};

impl Store {
    /// Append `values`, returning the new length.
    pub fn push<I>(&self, path: impl Into<AccessPath>, values: I) -> Result<usize, StoreError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let path = path.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let node = self.array_node(&path)?;
        if values.is_empty() {
            return Ok(node.len());
        }
        self.edit_array(path, &node, |items| {
            items.extend(values);
            items.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self, path: impl Into<AccessPath>) -> Result<Option<Value>, StoreError> {
        let path = path.into();
        let node = self.array_node(&path)?;
        if node.is_empty() {
            return Ok(None);
        }
        self.edit_array(path, &node, Vec::pop)
    }

    /// Remove and return the first element.
    pub fn shift(&self, path: impl Into<AccessPath>) -> Result<Option<Value>, StoreError> {
        let path = path.into();
        let node = self.array_node(&path)?;
        if node.is_empty() {
            return Ok(None);
        }
        self.edit_array(path, &node, |items| Some(items.remove(0)))
    }

    /// Prepend `values` (keeping their order), returning the new length.
    pub fn unshift<I>(&self, path: impl Into<AccessPath>, values: I) -> Result<usize, StoreError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let path = path.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let node = self.array_node(&path)?;
        if values.is_empty() {
            return Ok(node.len());
        }
        self.edit_array(path, &node, |items| {
            items.splice(0..0, values);
            items.len()
        })
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Both bounds are clamped to the array. Returns the
    /// removed elements.
    pub fn splice<I>(
        &self,
        path: impl Into<AccessPath>,
        start: usize,
        delete_count: usize,
        items: I,
    ) -> Result<Vec<Value>, StoreError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let path = path.into();
        let inserted: Vec<Value> = items.into_iter().map(Into::into).collect();
        let node = self.array_node(&path)?;
        let len = node.len();
        let start = start.min(len);
        let end = start.saturating_add(delete_count).min(len);
        if start == end && inserted.is_empty() {
            return Ok(Vec::new());
        }
        self.edit_array(path, &node, |items| items.splice(start..end, inserted).collect())
    }

    /// Reverse in place.
    pub fn reverse(&self, path: impl Into<AccessPath>) -> Result<(), StoreError> {
        let path = path.into();
        let node = self.array_node(&path)?;
        if node.len() < 2 {
            return Ok(());
        }
        self.edit_array(path, &node, |items| items.reverse())
    }

    /// Shorten to `len` elements, returning the removed tail.
    pub fn truncate(&self, path: impl Into<AccessPath>, len: usize) -> Result<Vec<Value>, StoreError> {
        let path = path.into();
        let node = self.array_node(&path)?;
        if len >= node.len() {
            return Ok(Vec::new());
        }
        self.edit_array(path, &node, |items| items.split_off(len))
    }

    fn array_node(&self, path: &AccessPath) -> Result<Node, StoreError> {
        match self.peek(path) {
            Value::Composite(node) if node.is_array() => Ok(node),
            _ => Err(StoreError::NotAnArray { path: path.clone() }),
        }
    }

    fn edit_array<R>(
        &self,
        path: AccessPath,
        node: &Node,
        edit: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R, StoreError> {
        self.guard_write(&path)?;
        let not_an_array = StoreError::NotAnArray { path: path.clone() };
        self.write_tracked(path, |_| {
            node.with_body_mut(|body| match body {
                Composite::Array(items) => Ok(edit(items)),
                _ => Err(not_an_array),
            })
        })
    }
}
