//! Store configuration.
//!
//! A [`StoreConfig`] is fixed when the store is created. It can be built in
//! code with the `with_*` methods or deserialized from JSON; missing fields
//! take their defaults.

use serde::{Deserialize, Serialize};

/// How the pending change set gets flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Use [`FlushMode::Tokio`] when a tokio runtime is running, otherwise
    /// [`FlushMode::Manual`].
    #[default]
    Auto,

    /// The host calls [`Store::flush`](crate::store::Store::flush) itself.
    Manual,

    /// Spawn one deferred task on the current tokio runtime per batch.
    Tokio,
}

/// Configuration for a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Flush scheduling strategy.
    pub flush_mode: FlushMode,

    /// Upper bound on consecutive passes in
    /// [`Store::flush_until_idle`](crate::store::Store::flush_until_idle).
    pub max_flush_passes: usize,

    /// Compare each pending path against its pre-batch snapshot at flush
    /// time and drop paths that ended up unchanged.
    pub verify_changes: bool,

    /// Reject writes made by observers in their render phase.
    pub reject_render_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            flush_mode: FlushMode::Auto,
            max_flush_passes: 64,
            verify_changes: true,
            reject_render_writes: true,
        }
    }
}

impl StoreConfig {
    /// Defaults with manual flushing.
    pub fn manual() -> Self {
        Self::default().with_flush_mode(FlushMode::Manual)
    }

    pub fn with_flush_mode(mut self, mode: FlushMode) -> Self {
        self.flush_mode = mode;
        self
    }

    pub fn with_max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = passes.max(1);
        self
    }

    pub fn with_verify_changes(mut self, verify: bool) -> Self {
        self.verify_changes = verify;
        self
    }

    pub fn with_reject_render_writes(mut self, reject: bool) -> Self {
        self.reject_render_writes = reject;
        self
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
