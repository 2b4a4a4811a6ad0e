//! Subscription Registry
//!
//! The registry maps observers to the paths they read during their last run
//! and answers the one question the flush needs: given the paths written in
//! this batch, which observers are affected?
//!
//! # Matching
//!
//! An observer with dependency `D` is affected by a write to `C` when `D` is
//! a prefix of `C` or `C` is a prefix of `D`. A dependency on `user` sees a
//! write to `user.name`; a dependency on `user.name` sees `user` being
//! replaced; a dependency on `user.name` never sees `user.email`.
//!
//! Dependency sets are replaced wholesale on every run, never patched.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;

use super::observer::{Observer, ObserverId};
use crate::path::AccessPath;

/// Observer table plus each observer's dependency set.
#[derive(Default)]
pub struct SubscriptionRegistry {
    observers: DashMap<ObserverId, Arc<Observer>>,
    dependencies: DashMap<ObserverId, Vec<AccessPath>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer with an empty dependency set.
    pub fn register(&self, observer: Arc<Observer>) -> ObserverId {
        let id = observer.id();
        self.observers.insert(id, observer);
        self.dependencies.insert(id, Vec::new());
        id
    }

    /// Remove an observer and its dependencies.
    ///
    /// The observer is disposed, so a run already scheduled for it is
    /// skipped.
    pub fn unregister(&self, id: ObserverId) -> Option<Arc<Observer>> {
        self.dependencies.remove(&id);
        let (_, observer) = self.observers.remove(&id)?;
        observer.dispose();
        Some(observer)
    }

    pub fn observer(&self, id: ObserverId) -> Option<Arc<Observer>> {
        self.observers.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.contains_key(&id)
    }

    /// Replace the dependency set of `id`.
    ///
    /// Ignored if the observer was unregistered in the meantime, so a run
    /// that unsubscribes itself does not resurrect its entry.
    pub fn subscribe(&self, id: ObserverId, dependencies: Vec<AccessPath>) {
        if !self.observers.contains_key(&id) {
            return;
        }
        tracing::trace!(observer = %id, count = dependencies.len(), "dependencies replaced");
        self.dependencies.insert(id, dependencies);
    }

    /// The current dependency set of `id`.
    pub fn dependencies(&self, id: ObserverId) -> Vec<AccessPath> {
        self.dependencies
            .get(&id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Observers affected by a write to `changed`, in creation order.
    pub fn resolve(&self, changed: &AccessPath) -> Vec<ObserverId> {
        self.resolve_all(std::iter::once(changed))
            .into_iter()
            .collect()
    }

    /// Union of affected observers across every path in `changed`.
    pub fn resolve_all<'a, I>(&self, changed: I) -> BTreeSet<ObserverId>
    where
        I: IntoIterator<Item = &'a AccessPath>,
    {
        let changed: Vec<&AccessPath> = changed.into_iter().collect();
        let mut affected = BTreeSet::new();
        if changed.is_empty() {
            return affected;
        }

        for entry in self.dependencies.iter() {
            let hit = entry
                .value()
                .iter()
                .any(|dep| changed.iter().any(|path| dep.is_related(path)));
            if hit {
                affected.insert(*entry.key());
            }
        }
        affected
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}
