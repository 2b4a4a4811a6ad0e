//! Trellis Core
//!
//! This crate provides the core of the Trellis reactive data store.
//! It implements:
//!
//! - An observable tree of values with path-based dependency tracking
//! - A subscription registry with ancestor/descendant path matching
//! - A batching scheduler that delivers one notification per observer per
//!   burst of writes
//! - An atomic JSON Patch transaction engine with rollback
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `path`: Access paths, their parsers, and prefix tests
//! - `value`: The values that make up the tree
//! - `snapshot`: Cycle-safe deep copy and deep equality
//! - `reactive`: Tracking context, observers, registry and scheduler
//! - `store`: The observable store, cursors, and array operations
//! - `patch`: Patch operations, transactions, and rollback handles
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::{PatchOperation, Store};
//! use serde_json::json;
//!
//! let store = Store::new(json!({ "user": { "name": "Ada", "email": "a@x" } }));
//!
//! // Reads inside an observer become its dependencies
//! let _sub = store.subscribe(|s| {
//!     println!("Hello, {}", s.get("user.name"));
//! });
//!
//! // Not a dependency: the observer stays quiet
//! store.set("user.email", "ada@x")?;
//!
//! // All-or-nothing patch
//! let result = store.patches().apply(&[
//!     PatchOperation::test("/user/name", "Ada"),
//!     PatchOperation::replace("/user/name", "Grace"),
//! ]);
//! assert!(result.success);
//!
//! // One notification for the whole burst, prints: "Hello, Grace"
//! store.flush();
//! ```

pub mod config;
pub mod error;
pub mod patch;
pub mod path;
pub mod reactive;
pub mod snapshot;
pub mod store;
pub mod value;

pub use config::{FlushMode, StoreConfig};
pub use error::{ErrorKind, PatchError, PathError, StoreError, ValueError};
pub use patch::{BatchResult, PatchEngine, PatchOperation, PatchResult, Rollback, Transaction};
pub use path::{AccessPath, PathSegment};
pub use reactive::{FlushReport, ObserverId, Phase};
pub use snapshot::{deep_clone, deep_equal, Snapshot};
pub use store::{Cursor, Store, Subscription};
pub use value::Value;
