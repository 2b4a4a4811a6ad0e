//! Composite nodes.
//!
//! A [`Node`] is a shared handle to one object, array, map or set inside the
//! tree. Two values refer to the same composite exactly when their nodes are
//! [`Node::ptr_eq`]; this identity is what makes shared substructure and
//! cycles representable.
//!
//! Mutation is crate-private. Code outside the crate can inspect a node it
//! read from the store, but every change has to go back through the store so
//! it is observed.

use std::mem;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::error::PathError;
use crate::path::{AccessPath, PathSegment};

/// How far past the end of an array a write may land. The gap is padded
/// with `Undefined`, so anything further is rejected instead of allocated.
pub const MAX_ARRAY_GAP: usize = 1 << 16;

/// Allocation identity of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What kind of composite a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Object,
    Array,
    Map,
    Set,
}

/// The body of a composite node.
#[derive(Clone)]
pub enum Composite {
    /// String-keyed properties in insertion order.
    Object(IndexMap<String, Value>),
    /// Dense, ordered elements.
    Array(Vec<Value>),
    /// Arbitrary keys, compared structurally. Not addressable by path.
    Map(Vec<(Value, Value)>),
    /// Unique members, compared structurally. Not addressable by path.
    Set(Vec<Value>),
}

impl Composite {
    pub fn kind(&self) -> CompositeKind {
        match self {
            Self::Object(_) => CompositeKind::Object,
            Self::Array(_) => CompositeKind::Array,
            Self::Map(_) => CompositeKind::Map,
            Self::Set(_) => CompositeKind::Set,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Object(map) => map.len(),
            Self::Array(items) | Self::Set(items) => items.len(),
            Self::Map(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty body of the same kind.
    pub(crate) fn empty_like(&self) -> Self {
        match self {
            Self::Object(_) => Self::Object(IndexMap::new()),
            Self::Array(_) => Self::Array(Vec::new()),
            Self::Map(_) => Self::Map(Vec::new()),
            Self::Set(_) => Self::Set(Vec::new()),
        }
    }

    /// Rebuild the body with every contained value passed through `f`.
    pub(crate) fn map_values(self, mut f: impl FnMut(Value) -> Value) -> Self {
        match self {
            Self::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, f(v))).collect()),
            Self::Array(items) => Self::Array(items.into_iter().map(&mut f).collect()),
            Self::Map(entries) => Self::Map(entries.into_iter().map(|(k, v)| (f(k), f(v))).collect()),
            Self::Set(items) => Self::Set(items.into_iter().map(&mut f).collect()),
        }
    }
}

pub(crate) struct NodeData {
    body: Composite,
    /// Out-of-band keys. Never observed, compared, or snapshotted.
    meta: IndexMap<String, Value>,
}

/// Shared handle to a composite value.
#[derive(Clone)]
pub struct Node(Arc<RwLock<NodeData>>);

impl Node {
    pub fn new(body: Composite) -> Self {
        Self(Arc::new(RwLock::new(NodeData {
            body,
            meta: IndexMap::new(),
        })))
    }

    pub fn id(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// Whether both handles refer to the same composite.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn kind(&self) -> CompositeKind {
        self.0.read().body.kind()
    }

    pub fn is_array(&self) -> bool {
        self.kind() == CompositeKind::Array
    }

    pub fn is_object(&self) -> bool {
        self.kind() == CompositeKind::Object
    }

    pub fn len(&self) -> usize {
        self.0.read().body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inspect the body. The lock is held for the duration of `f`.
    pub fn with_body<R>(&self, f: impl FnOnce(&Composite) -> R) -> R {
        f(&self.0.read().body)
    }

    /// A shallow copy of the body; children are shared handles.
    pub fn entries(&self) -> Composite {
        self.0.read().body.clone()
    }

    /// Object keys in insertion order (empty for other kinds).
    pub fn keys(&self) -> Vec<String> {
        self.with_body(|body| match body {
            Composite::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        })
    }

    /// The child at `segment`, if this node is addressable and has one.
    pub fn get(&self, segment: &PathSegment) -> Option<Value> {
        self.with_body(|body| match body {
            Composite::Object(map) => map.get(segment.as_key().as_ref()).cloned(),
            Composite::Array(items) => segment.as_index().and_then(|i| items.get(i).cloned()),
            Composite::Map(_) | Composite::Set(_) => None,
        })
    }

    /// Read a hidden metadata key.
    pub fn meta(&self, key: &str) -> Option<Value> {
        self.0.read().meta.get(key).cloned()
    }

    pub(crate) fn with_body_mut<R>(&self, f: impl FnOnce(&mut Composite) -> R) -> R {
        f(&mut self.0.write().body)
    }

    pub(crate) fn replace_body(&self, body: Composite) {
        self.0.write().body = body;
    }

    pub(crate) fn set_meta(&self, key: String, value: Value) -> Option<Value> {
        self.0.write().meta.insert(key, value)
    }

    pub(crate) fn remove_meta(&self, key: &str) -> Option<Value> {
        self.0.write().meta.shift_remove(key)
    }

    /// Store `value` at `segment`, returning the displaced value.
    ///
    /// Array writes past the end pad with `Undefined`, up to
    /// [`MAX_ARRAY_GAP`] slots.
    pub(crate) fn put(
        &self,
        segment: &PathSegment,
        value: Value,
        path: &AccessPath,
    ) -> Result<Option<Value>, PathError> {
        self.with_body_mut(|body| match body {
            Composite::Object(map) => Ok(map.insert(segment.as_key().into_owned(), value)),
            Composite::Array(items) => {
                let index = array_index(segment, path)?;
                let len = items.len();
                if index < len {
                    Ok(Some(mem::replace(&mut items[index], value)))
                } else if index - len > MAX_ARRAY_GAP {
                    Err(PathError::OutOfBounds {
                        path: path.clone(),
                        index,
                        len,
                    })
                } else {
                    items.resize(index, Value::Undefined);
                    items.push(value);
                    Ok(None)
                }
            }
            other => Err(PathError::NotAContainer {
                path: path.clone(),
                kind: kind_article(other.kind()),
            }),
        })
    }

    /// Remove the child at `segment`, returning it with its position.
    ///
    /// Array removal shifts later elements down.
    pub(crate) fn remove(
        &self,
        segment: &PathSegment,
        path: &AccessPath,
    ) -> Result<Option<(Value, usize)>, PathError> {
        self.with_body_mut(|body| match body {
            Composite::Object(map) => Ok(map
                .shift_remove_full(segment.as_key().as_ref())
                .map(|(position, _, value)| (value, position))),
            Composite::Array(items) => {
                let index = array_index(segment, path)?;
                Ok((index < items.len()).then(|| (items.remove(index), index)))
            }
            other => Err(PathError::NotAContainer {
                path: path.clone(),
                kind: kind_article(other.kind()),
            }),
        })
    }

    /// Insert `value` at `segment`, placing it at `position`.
    ///
    /// For objects `position` is the key order slot; for arrays it is the
    /// element index and later elements shift up.
    pub(crate) fn insert_at(
        &self,
        segment: &PathSegment,
        position: usize,
        value: Value,
        path: &AccessPath,
    ) -> Result<(), PathError> {
        self.with_body_mut(|body| match body {
            Composite::Object(map) => {
                let position = position.min(map.len());
                map.shift_insert(position, segment.as_key().into_owned(), value);
                Ok(())
            }
            Composite::Array(items) => {
                if position > items.len() {
                    return Err(PathError::OutOfBounds {
                        path: path.clone(),
                        index: position,
                        len: items.len(),
                    });
                }
                items.insert(position, value);
                Ok(())
            }
            other => Err(PathError::NotAContainer {
                path: path.clone(),
                kind: kind_article(other.kind()),
            }),
        })
    }
}

fn array_index(segment: &PathSegment, path: &AccessPath) -> Result<usize, PathError> {
    segment.as_index().ok_or_else(|| PathError::InvalidIndex {
        path: path.clone(),
        segment: segment.to_string(),
    })
}

pub(crate) fn kind_article(kind: CompositeKind) -> &'static str {
    match kind {
        CompositeKind::Object => "an object",
        CompositeKind::Array => "an array",
        CompositeKind::Map => "a map",
        CompositeKind::Set => "a set",
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&Value::Composite(self.clone()), f)
    }
}
