//! Patch Engine Tests
//!
//! End-to-end checks of JSON Patch documents, inverse ordering, and batch
//! rollback against a live store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use trellis_core::{ErrorKind, PatchError, PatchOperation, Store, StoreConfig, Value};

fn manual(initial: serde_json::Value) -> Store {
    Store::with_config(initial, StoreConfig::manual())
}

/// Test that a document decodes, applies, and serializes back unchanged.
#[test]
fn document_round_trip_through_the_store() {
    let document = json!([
        { "op": "add", "path": "/todos/-", "value": { "title": "write", "done": false } },
        { "op": "replace", "path": "/todos/0/done", "value": true },
        { "op": "test", "path": "/todos/0", "value": { "done": true, "title": "write" } }
    ]);

    let store = manual(json!({ "todos": [] }));
    let result = store.patches().apply_json(&document.to_string()).unwrap();

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.applied_count, 3);
    assert_eq!(store.peek("todos"), json!([{ "title": "write", "done": true }]));

    let ops = PatchOperation::parse_document(&document.to_string()).unwrap();
    assert_eq!(serde_json::to_value(&ops).unwrap(), document);
}

/// Test that an unknown op name is a decode error, not a partial apply.
#[test]
fn unknown_op_is_rejected_before_anything_runs() {
    let store = manual(json!({ "a": 1 }));
    let result = store.patches().apply_json(
        r#"[{"op":"replace","path":"/a","value":2},{"op":"move","from":"/a","path":"/b"}]"#,
    );

    assert!(matches!(result, Err(PatchError::Decode(_))));
    assert_eq!(store.peek("a"), Value::from(1));
}

/// Test that escaped pointer segments address the right keys.
#[test]
fn escaped_pointers() {
    let store = manual(json!({ "a/b": { "~tilde": 1 } }));
    let result = store
        .patches()
        .apply(&[PatchOperation::replace("/a~1b/~0tilde", 2)]);

    assert!(result.success);
    assert_eq!(store.peek(""), json!({ "a/b": { "~tilde": 2 } }));
}

/// Test that removing array elements and failing puts them back in place.
#[test]
fn removed_elements_are_reinserted_in_order() {
    let store = manual(json!({ "items": ["a", "b", "c", "d"] }));
    let result = store.patches().apply(&[
        PatchOperation::remove("/items/1"),
        PatchOperation::remove("/items/1"),
        PatchOperation::test("/items", json!(["a"])),
    ]);

    assert!(!result.success);
    assert_eq!(result.failed_index, Some(2));
    assert_eq!(store.peek("items"), json!(["a", "b", "c", "d"]));
}

/// Test that removing an object key and failing restores the key order.
#[test]
fn removed_keys_return_to_their_slot() {
    let store = manual(json!({ "first": 1, "second": 2, "third": 3 }));
    let result = store.patches().apply(&[
        PatchOperation::remove("/second"),
        PatchOperation::test("/first", 0),
    ]);

    assert!(!result.success);
    let keys = store.at("").keys();
    assert_eq!(keys, vec!["first", "second", "third"]);
}

/// Test the failure modes of each operation.
#[test]
fn operation_failures_are_classified() {
    let store = manual(json!({ "obj": {}, "list": [1], "n": 1 }));
    let cases = [
        (PatchOperation::remove("/missing"), ErrorKind::Execution),
        (PatchOperation::replace("/missing", 1), ErrorKind::Execution),
        (PatchOperation::add("/list/5", 1), ErrorKind::Execution),
        (PatchOperation::add("/n/child", 1), ErrorKind::Execution),
        (PatchOperation::test("/n", 2), ErrorKind::Validation),
        (PatchOperation::remove(""), ErrorKind::Execution),
    ];

    for (op, kind) in cases {
        let result = store.patches().apply(&[op.clone()]);
        assert!(!result.success, "{op:?} should fail");
        let error = result.error.expect("failed result carries an error");
        assert_eq!(error.kind(), kind, "{op:?}: {error}");
    }
    assert_eq!(store.peek(""), json!({ "obj": {}, "list": [1], "n": 1 }));
}

/// Test that adding under missing parents creates them and undoes cleanly.
#[test]
fn add_creates_intermediate_objects() {
    let store = manual(json!({}));
    let result = store.patches().apply(&[
        PatchOperation::add("/settings/theme/mode", "dark"),
        PatchOperation::test("/settings/theme", json!({ "mode": "dark" })),
    ]);
    assert!(result.success, "{:?}", result.error);
    assert_eq!(store.peek("settings.theme.mode"), Value::from("dark"));

    result.rollback.rollback().unwrap();
    assert_eq!(store.peek(""), json!({}));
}

/// Test that a successful patch notifies observers once at the next flush.
#[test]
fn successful_patch_is_one_batch() {
    let store = manual(json!({ "count": 0, "log": [] }));
    let runs = Arc::new(AtomicUsize::new(0));
    let runs_clone = runs.clone();
    let _sub = store.subscribe(move |s| {
        s.get("count");
        s.get("log");
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    let result = store.patches().apply(&[
        PatchOperation::replace("/count", 1),
        PatchOperation::add("/log/-", "inc"),
        PatchOperation::add("/log/-", "inc"),
    ]);
    assert!(result.success);

    let report = store.flush();
    assert_eq!(report.notified.len(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that a rollback after unrelated writes leaves those writes alone.
#[test]
fn rollback_only_touches_its_own_paths() {
    let store = manual(json!({ "mine": 1, "theirs": 1 }));
    let result = store
        .patches()
        .apply(&[PatchOperation::replace("/mine", 2)]);

    store.set("theirs", 2).unwrap();
    store.set("other", "added later").unwrap();
    result.rollback.rollback().unwrap();

    assert_eq!(
        store.peek(""),
        json!({ "mine": 1, "theirs": 2, "other": "added later" })
    );
}

/// Test that a failed batch rolls back every earlier unit, newest first.
#[test]
fn batch_failure_restores_everything() {
    let store = manual(json!({ "stock": { "apples": 3 }, "orders": [] }));
    let batch = vec![
        vec![
            PatchOperation::replace("/stock/apples", 2),
            PatchOperation::add("/orders/-", json!({ "item": "apples" })),
        ],
        vec![
            PatchOperation::replace("/stock/apples", 1),
            PatchOperation::add("/orders/-", json!({ "item": "apples" })),
        ],
        vec![
            PatchOperation::test("/stock/apples", 2),
            PatchOperation::replace("/stock/apples", 0),
        ],
    ];

    let result = store.patches().apply_batch(&batch);

    assert!(!result.success);
    assert_eq!(result.failed_index, Some(2));
    assert!(result.results[0].success);
    assert!(result.results[1].success);
    assert!(!result.results[2].success);
    assert_eq!(store.peek(""), json!({ "stock": { "apples": 3 }, "orders": [] }));
}

/// Test that every unit in a successful batch can be undone together.
#[test]
fn batch_rollback_all() {
    let store = manual(json!({ "a": { "n": 0 } }));
    let batch = [
        vec![PatchOperation::add("/a/m", 1)],
        vec![PatchOperation::remove("/a/n")],
        vec![PatchOperation::replace("/a", json!([1, 2]))],
    ];

    let result = store.patches().apply_batch(&batch);
    assert!(result.success);
    assert_eq!(store.peek("a"), json!([1, 2]));

    assert_eq!(result.rollback_all().unwrap(), 3);
    assert_eq!(store.peek(""), json!({ "a": { "n": 0 } }));
    assert_eq!(result.rollback_all().unwrap(), 0);
}

/// Test that a patch from a render observer fails cleanly.
#[test]
fn render_observer_cannot_patch() {
    let store = manual(json!({ "n": 0 }));
    let kinds = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let kinds_clone = kinds.clone();

    let _sub = store.subscribe_render(move |s| {
        let result = s.patches().apply(&[PatchOperation::replace("/n", 1)]);
        kinds_clone.lock().push(result.error.map(|err| err.kind()));
    });

    assert_eq!(kinds.lock().as_slice(), &[Some(ErrorKind::ReadOnly)]);
    assert_eq!(store.peek("n"), Value::from(0));
}
