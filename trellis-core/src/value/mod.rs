//! Tree Values
//!
//! A [`Value`] is anything that can live in the store's tree: scalars,
//! date-like and regex-like leaves, opaque function references, and
//! composites (objects, arrays, maps, sets) behind a shared [`Node`].
//!
//! # Equality
//!
//! `PartialEq` on `Value` is structural ([`deep_equal`]): object key order is
//! ignored, composites compare by content, and cyclic values terminate.
//! [`Value::same_as`] is the identity check used when structure is not
//! wanted.
//!
//! [`deep_equal`]: crate::snapshot::deep_equal

mod json;
mod node;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::path::{AccessPath, PathSegment};
use crate::snapshot;

pub use node::{Composite, CompositeKind, Node, NodeId, MAX_ARRAY_GAP};
pub(crate) use node::kind_article;

/// Signature of a function stored as an opaque leaf.
pub type NativeFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// An opaque function reference. Compared by identity, never traversed.
#[derive(Clone)]
pub struct FunctionRef {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl FunctionRef {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function {}]", self.name)
    }
}

/// A regex-like leaf. Kept as source text; never compiled or executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegexValue {
    pub source: String,
    pub flags: String,
}

/// A value in the tree.
#[derive(Clone, Default)]
pub enum Value {
    /// An absent value. Reads of missing paths produce this.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(OffsetDateTime),
    Regex(RegexValue),
    Function(FunctionRef),
    /// An object, array, map or set.
    Composite(Node),
}

impl Value {
    /// A fresh object from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map: IndexMap<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::Composite(Node::new(Composite::Object(map)))
    }

    /// A fresh array.
    pub fn array<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::Composite(Node::new(Composite::Array(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    /// A fresh map with arbitrary keys.
    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        Self::Composite(Node::new(Composite::Map(entries.into_iter().collect())))
    }

    /// A fresh set. Structurally duplicate members are dropped.
    pub fn set<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut unique: Vec<Value> = Vec::new();
        for member in members {
            if !unique.iter().any(|m| snapshot::deep_equal(m, &member)) {
                unique.push(member);
            }
        }
        Self::Composite(Node::new(Composite::Set(unique)))
    }

    pub fn empty_object() -> Self {
        Self::Composite(Node::new(Composite::Object(IndexMap::new())))
    }

    pub fn empty_array() -> Self {
        Self::Composite(Node::new(Composite::Array(Vec::new())))
    }

    pub fn regex(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self::Regex(RegexValue {
            source: source.into(),
            flags: flags.into(),
        })
    }

    pub fn function<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self::Function(FunctionRef::new(name, func))
    }

    /// Short description of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "a boolean",
            Self::Number(_) => "a number",
            Self::String(_) => "a string",
            Self::Date(_) => "a date",
            Self::Regex(_) => "a regex",
            Self::Function(_) => "a function",
            Self::Composite(node) => kind_article(node.kind()),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    pub fn is_object(&self) -> bool {
        self.as_node().is_some_and(Node::is_object)
    }

    pub fn is_array(&self) -> bool {
        self.as_node().is_some_and(Node::is_array)
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Composite(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Element or key count for composites.
    pub fn len(&self) -> Option<usize> {
        self.as_node().map(Node::len)
    }

    /// The direct child at `segment`.
    pub fn child(&self, segment: &PathSegment) -> Option<Value> {
        self.as_node().and_then(|node| node.get(segment))
    }

    /// Follow `path` from this value.
    pub fn lookup(&self, path: &AccessPath) -> Option<Value> {
        let mut current = self.clone();
        for segment in path.segments() {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Identity comparison: composites and functions by reference, scalars
    /// by value.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Composite(a), Self::Composite(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Composite(_), _) | (_, Self::Composite(_)) => false,
            _ => snapshot::deep_equal(self, other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        snapshot::deep_equal(self, other)
    }
}

impl PartialEq<serde_json::Value> for Value {
    fn eq(&self, other: &serde_json::Value) -> bool {
        snapshot::deep_equal(self, &Value::from(other.clone()))
    }
}

macro_rules! from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(date: OffsetDateTime) -> Self {
        Self::Date(date)
    }
}

impl From<RegexValue> for Value {
    fn from(regex: RegexValue) -> Self {
        Self::Regex(regex)
    }
}

impl From<FunctionRef> for Value {
    fn from(func: FunctionRef) -> Self {
        Self::Function(func)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Composite(node)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::array(items)
    }
}
