//! Reactive Machinery
//!
//! This module holds everything between a read of the store and the
//! notification of the observers that depend on it.
//!
//! # Concepts
//!
//! ## Tracking context
//!
//! While an observer runs, a thread-local [`ReactiveContext`] collects every
//! path the store hands out. Dependencies are never declared; they are
//! whatever the observer actually read on its last run.
//!
//! ## Observers
//!
//! An [`Observer`] is a callback with a [`Phase`]. Effects may write back
//! into the store; renders may not.
//!
//! ## Registry
//!
//! The [`SubscriptionRegistry`] stores each observer's dependency set and
//! resolves written paths to affected observers using prefix matching.
//!
//! ## Scheduler
//!
//! The [`BatchScheduler`] coalesces the writes of one turn into a single
//! pending set and makes sure exactly one flush is scheduled for it.

mod context;
mod observer;
mod registry;
mod scheduler;

pub use context::ReactiveContext;
pub use observer::{Observer, ObserverFn, ObserverId, Phase};
pub(crate) use observer::{panic_message, Execution};
pub use registry::SubscriptionRegistry;
pub use scheduler::{BatchScheduler, FlushReport, PendingChange};
