//! Snapshot Engine
//!
//! Deep copies and deep comparisons over [`Value`] trees.
//!
//! Both traversals are cycle safe. [`deep_clone`] keeps a map from every
//! source node to its copy, so a node reached twice is copied once and a
//! cyclic source produces an equally cyclic copy. [`deep_equal`] remembers
//! which node pairs are already being compared and treats a revisited pair
//! as equal, which is what lets two isomorphic cycles compare equal.
//!
//! Neither traversal holds a node lock while descending: each level takes a
//! shallow copy of the body first.

use std::collections::{HashMap, HashSet};

use crate::path::AccessPath;
use crate::value::{Composite, Node, NodeId, Value};

/// An inert deep copy of a subtree, tagged with where it came from.
///
/// A snapshot shares no nodes with the live tree. Restoring one inserts a
/// fresh copy, so the snapshot itself can be restored any number of times.
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: AccessPath,
    value: Value,
}

impl Snapshot {
    /// Capture `value` (found at `path`).
    pub fn capture(path: AccessPath, value: &Value) -> Self {
        Self {
            path,
            value: deep_clone(value),
        }
    }

    pub fn path(&self) -> &AccessPath {
        &self.path
    }

    /// The captured value. Callers must not insert it into a live tree;
    /// use [`Snapshot::to_value`] for that.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// A fresh deep copy of the captured value.
    pub fn to_value(&self) -> Value {
        deep_clone(&self.value)
    }

    /// Whether `current` is structurally equal to the captured value.
    pub fn matches(&self, current: &Value) -> bool {
        deep_equal(&self.value, current)
    }
}

/// Deep copy `value`, preserving shared substructure and cycles.
pub fn deep_clone(value: &Value) -> Value {
    clone_inner(value, &mut HashMap::new())
}

fn clone_inner(value: &Value, copies: &mut HashMap<NodeId, Node>) -> Value {
    let Value::Composite(node) = value else {
        return value.clone();
    };
    if let Some(copy) = copies.get(&node.id()) {
        return Value::Composite(copy.clone());
    }

    let body = node.entries();
    let copy = Node::new(body.empty_like());
    copies.insert(node.id(), copy.clone());

    let filled = body.map_values(|child| clone_inner(&child, copies));
    copy.replace_body(filled);
    Value::Composite(copy)
}

/// Structural equality.
///
/// Objects ignore key order; maps and sets ignore member order; numbers use
/// numeric equality with `NaN` equal to itself; functions compare by
/// identity; metadata keys are ignored.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    equal_inner(a, b, &mut HashSet::new())
}

fn equal_inner(a: &Value, b: &Value, seen: &mut HashSet<(NodeId, NodeId)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x == y,
        (Value::Regex(x), Value::Regex(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => x.ptr_eq(y),
        (Value::Composite(x), Value::Composite(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.id(), y.id())) {
                return true;
            }
            composite_equal(x.entries(), y.entries(), seen)
        }
        _ => false,
    }
}

fn composite_equal(a: Composite, b: Composite, seen: &mut HashSet<(NodeId, NodeId)>) -> bool {
    match (a, b) {
        (Composite::Object(x), Composite::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, xv)| {
                    y.get(key)
                        .is_some_and(|yv| equal_inner(xv, yv, seen))
                })
        }
        (Composite::Array(x), Composite::Array(y)) => {
            x.len() == y.len() && x.iter().zip(&y).all(|(xv, yv)| equal_inner(xv, yv, seen))
        }
        (Composite::Set(x), Composite::Set(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|xv| y.iter().any(|yv| trial(seen, |s| equal_inner(xv, yv, s))))
        }
        (Composite::Map(x), Composite::Map(y)) => {
            x.len() == y.len()
                && x.iter().all(|(xk, xv)| {
                    y.iter().any(|(yk, yv)| {
                        trial(seen, |s| equal_inner(xk, yk, s) && equal_inner(xv, yv, s))
                    })
                })
        }
        _ => false,
    }
}

/// Run an unordered-member comparison against a scratch copy of `seen`,
/// keeping its assumptions only when the members matched.
fn trial(
    seen: &mut HashSet<(NodeId, NodeId)>,
    compare: impl FnOnce(&mut HashSet<(NodeId, NodeId)>) -> bool,
) -> bool {
    let mut scratch = seen.clone();
    let matched = compare(&mut scratch);
    if matched {
        *seen = scratch;
    }
    matched
}
