//! Property tests for hierarchical path matching.
//!
//! The same rule decides which observers a write reaches at every layer:
//! `AccessPath::is_related`, the registry's resolution, and the store's
//! flush. These properties pin all three to each other.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use trellis_core::reactive::{Observer, SubscriptionRegistry};
use trellis_core::{AccessPath, PathSegment, Phase, Store, StoreConfig};

// =============================================================================
// Strategies
// =============================================================================

const KEYS: [&str; 3] = ["a", "b", "c"];

fn key() -> impl Strategy<Value = PathSegment> {
    prop::sample::select(KEYS.to_vec()).prop_map(|k| PathSegment::key(k))
}

fn segment() -> impl Strategy<Value = PathSegment> {
    prop_oneof![key(), (0usize..3).prop_map(PathSegment::Index)]
}

fn path() -> impl Strategy<Value = AccessPath> {
    prop::collection::vec(segment(), 0..5).prop_map(AccessPath::from)
}

fn key_path() -> impl Strategy<Value = AccessPath> {
    prop::collection::vec(key(), 1..4).prop_map(AccessPath::from)
}

fn join(prefix: &AccessPath, tail: &[PathSegment]) -> AccessPath {
    tail.iter().cloned().fold(prefix.clone(), |path, seg| path.child(seg))
}

// =============================================================================
// The matching rule
// =============================================================================

proptest! {
    #[test]
    fn related_is_symmetric(a in path(), b in path()) {
        prop_assert_eq!(a.is_related(&b), b.is_related(&a));
    }

    #[test]
    fn every_path_relates_to_itself_and_the_root(a in path()) {
        prop_assert!(a.is_related(&a));
        prop_assert!(AccessPath::root().is_related(&a));
    }

    #[test]
    fn extensions_are_related(a in path(), tail in prop::collection::vec(segment(), 0..4)) {
        let extended = join(&a, &tail);
        prop_assert!(a.is_prefix_of(&extended));
        prop_assert!(a.is_related(&extended));
        prop_assert_eq!(a.is_ancestor_of(&extended), !tail.is_empty());
    }

    #[test]
    fn diverging_paths_are_unrelated(
        prefix in path(),
        (i, j) in (0usize..3, 0usize..3).prop_filter("distinct keys", |(i, j)| i != j),
        left in prop::collection::vec(segment(), 0..3),
        right in prop::collection::vec(segment(), 0..3),
    ) {
        let a = join(&prefix.child(KEYS[i]), &left);
        let b = join(&prefix.child(KEYS[j]), &right);
        prop_assert!(!a.is_related(&b));
    }
}

// =============================================================================
// Path codecs
// =============================================================================

proptest! {
    #[test]
    fn display_form_parses_back(a in path()) {
        let text = a.to_string();
        prop_assert_eq!(AccessPath::parse(&text), Ok(a));
    }

    #[test]
    fn pointer_form_parses_back(a in path()) {
        let pointer = a.to_pointer();
        prop_assert_eq!(AccessPath::from_pointer(&pointer), Ok(a));
    }
}

// =============================================================================
// Registry resolution
// =============================================================================

proptest! {
    #[test]
    fn resolve_matches_the_rule(
        deps in prop::collection::vec(prop::collection::vec(path(), 0..4), 1..6),
        changed in prop::collection::vec(path(), 0..4),
    ) {
        let registry = SubscriptionRegistry::new();
        let mut expected = BTreeSet::new();

        for paths in deps {
            let id = registry.register(Arc::new(Observer::new(Phase::Effect, |_: &Store| {})));
            if paths.iter().any(|dep| changed.iter().any(|c| dep.is_related(c))) {
                expected.insert(id);
            }
            registry.subscribe(id, paths);
        }

        prop_assert_eq!(registry.resolve_all(&changed), expected);
    }
}

// =============================================================================
// Store delivery
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn store_notifies_exactly_the_related_observer(read in key_path(), write in key_path()) {
        let store = Store::with_config(serde_json::json!({}), StoreConfig::manual());
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let read_clone = read.clone();
        let _sub = store.subscribe(move |s| {
            s.get(&read_clone);
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set(&write, 1).unwrap();
        store.flush();

        let expected = if read.is_related(&write) { 2 } else { 1 };
        prop_assert_eq!(runs.load(Ordering::SeqCst), expected);
    }
}
