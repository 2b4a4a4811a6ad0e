//! Patch operations and their wire format.

use serde::{Deserialize, Serialize};

use crate::error::PathError;
use crate::path::AccessPath;
use crate::value::Value;

/// One step of a patch transaction.
///
/// Serialized the JSON Patch way, tagged on `op` with RFC 6901 paths:
///
/// ```json
/// [
///   { "op": "test", "path": "/ver", "value": 10 },
///   { "op": "replace", "path": "/count", "value": 2 }
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert into an array or set an object key. `-` appends.
    Add { path: String, value: Value },
    /// Remove an existing key or element.
    Remove { path: String },
    /// Overwrite an existing value.
    Replace { path: String, value: Value },
    /// Assert structural equality. Never mutates.
    Test { path: String, value: Value },
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Add {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Replace {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn test(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Test {
            path: path.into(),
            value: value.into(),
        }
    }

    /// The operation name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Test { .. } => "test",
        }
    }

    /// The raw pointer string.
    pub fn pointer(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    /// The parsed target path.
    pub fn path(&self) -> Result<AccessPath, PathError> {
        AccessPath::from_pointer(self.pointer())
    }

    /// Parse a JSON Patch document.
    pub fn parse_document(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}
