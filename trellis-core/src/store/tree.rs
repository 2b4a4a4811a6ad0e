//! Path resolution against the live tree.

use crate::error::PathError;
use crate::path::{AccessPath, PathSegment};
use crate::value::{Composite, Node, Value};

/// The node at `path`, which must already exist and be a composite.
pub(crate) fn find_node(root: &Value, path: &AccessPath) -> Result<Node, PathError> {
    match root.lookup(path) {
        Some(Value::Composite(node)) => Ok(node),
        Some(Value::Undefined) | None => Err(PathError::Missing { path: path.clone() }),
        Some(other) => Err(PathError::NotAContainer {
            path: path.clone(),
            kind: other.kind_name(),
        }),
    }
}

/// The node that will hold `segment` under `parent`, creating any missing
/// composites on the way.
///
/// A missing step becomes an array when the segment after it is an index
/// and an object otherwise. `Undefined` counts as missing; any other
/// scalar is an error.
pub(crate) fn ensure_parent(
    root: &Value,
    parent: &AccessPath,
    segment: &PathSegment,
) -> Result<Node, PathError> {
    let Value::Composite(mut current) = root.clone() else {
        return Err(PathError::NotAContainer {
            path: AccessPath::root(),
            kind: root.kind_name(),
        });
    };

    let segments = parent.segments();
    for (depth, step) in segments.iter().enumerate() {
        let here = parent.prefix(depth + 1);
        current = match current.get(step) {
            Some(Value::Composite(node)) => node,
            Some(Value::Undefined) | None => {
                let next = segments.get(depth + 1).unwrap_or(segment);
                let created = Node::new(empty_for(next));
                current.put(step, Value::Composite(created.clone()), &parent.prefix(depth))?;
                tracing::trace!(path = %here, "created intermediate");
                created
            }
            Some(other) => {
                return Err(PathError::NotAContainer {
                    path: here,
                    kind: other.kind_name(),
                })
            }
        };
    }
    Ok(current)
}

/// The longest prefix of `path` that does not currently resolve, if any.
///
/// This is the outermost ancestor that writing `path` would create.
pub(crate) fn first_missing(root: &Value, path: &AccessPath) -> Option<AccessPath> {
    let mut current = root.clone();
    for (depth, segment) in path.segments().iter().enumerate() {
        match current.child(segment) {
            Some(Value::Undefined) | None => return Some(path.prefix(depth + 1)),
            Some(child) => current = child,
        }
    }
    None
}

fn empty_for(next: &PathSegment) -> Composite {
    match next {
        PathSegment::Index(_) => Composite::Array(Vec::new()),
        PathSegment::Key(_) => Composite::Object(Default::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ensure_parent_builds_arrays_for_index_steps() {
        let root = Value::from(json!({}));
        let path = AccessPath::from("a.list[0].name");
        let (parent, segment) = path.split_last().unwrap();

        let node = ensure_parent(&root, &parent, &segment).unwrap();
        node.put(&segment, Value::from("x"), &parent).unwrap();

        assert_eq!(root, json!({ "a": { "list": [{ "name": "x" }] } }));
    }

    #[test]
    fn ensure_parent_refuses_to_descend_into_scalars() {
        let root = Value::from(json!({ "a": 1 }));
        let err = ensure_parent(&root, &AccessPath::from("a"), &PathSegment::key("b")).unwrap_err();

        assert_eq!(
            err,
            PathError::NotAContainer {
                path: AccessPath::from("a"),
                kind: "a number"
            }
        );
        assert_eq!(root, json!({ "a": 1 }));
    }

    #[test]
    fn find_node_reports_missing_paths() {
        let root = Value::from(json!({ "a": { "b": [] } }));

        assert!(find_node(&root, &AccessPath::from("a.b")).unwrap().is_array());
        assert!(matches!(
            find_node(&root, &AccessPath::from("a.c")),
            Err(PathError::Missing { .. })
        ));
    }

    #[test]
    fn first_missing_finds_the_outermost_gap() {
        let root = Value::from(json!({ "a": { "b": 1 } }));

        assert_eq!(
            first_missing(&root, &AccessPath::from("a.x.y.z")),
            Some(AccessPath::from("a.x"))
        );
        assert_eq!(first_missing(&root, &AccessPath::from("a.b")), None);
    }
}
