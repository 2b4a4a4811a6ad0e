//! Subscription guards.

use std::sync::Weak;

use super::{Store, StoreInner};
use crate::reactive::ObserverId;

/// Handle to a registered observer.
///
/// Dropping the handle unsubscribes the observer. Call
/// [`Subscription::detach`] to keep it registered for the life of the store.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: ObserverId,
    store: Weak<StoreInner>,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(id: ObserverId, store: &Store) -> Self {
        Self {
            id,
            store: store.downgrade(),
            detached: false,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Keep the observer registered after this handle is dropped.
    pub fn detach(mut self) -> ObserverId {
        self.detached = true;
        self.id
    }

    /// Unsubscribe now. Returns whether the observer was still registered.
    pub fn unsubscribe(mut self) -> bool {
        self.detached = true;
        self.store
            .upgrade()
            .is_some_and(|inner| Store::from_inner(inner).unsubscribe(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(inner) = self.store.upgrade() {
            Store::from_inner(inner).unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.detached)
            .finish()
    }
}
