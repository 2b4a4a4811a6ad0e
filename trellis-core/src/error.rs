//! Error types.
//!
//! Every fallible operation in the crate reports one of these enums. The
//! [`ErrorKind`] classification maps them onto the four failure classes the
//! store distinguishes: validation, execution, read-only violations, and
//! references to paths that do not exist.

use thiserror::Error;

use crate::path::AccessPath;
use crate::reactive::ObserverId;

/// Coarse classification shared by all error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A `test` assertion did not hold. Expected and non-fatal.
    Validation,
    /// An operation or user-supplied mutation failed.
    Execution,
    /// A write was attempted while the current observer was rendering.
    ReadOnly,
    /// A path did not resolve against the current tree shape.
    Reference,
}

/// Errors produced while parsing or resolving an [`AccessPath`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed path `{input}`: {reason}")]
    Syntax { input: String, reason: String },

    #[error("malformed JSON pointer `{0}`")]
    Pointer(String),

    #[error("`{path}` does not exist")]
    Missing { path: AccessPath },

    #[error("`{path}` holds {kind}, which has no addressable children")]
    NotAContainer { path: AccessPath, kind: &'static str },

    #[error("`{segment}` is not a valid index into the array at `{path}`")]
    InvalidIndex { path: AccessPath, segment: String },

    #[error("index {index} is out of bounds for `{path}` (length {len})")]
    OutOfBounds {
        path: AccessPath,
        index: usize,
        len: usize,
    },

    #[error("the root cannot be removed")]
    RootRemoval,
}

impl PathError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Missing { .. } => ErrorKind::Reference,
            _ => ErrorKind::Execution,
        }
    }
}

/// Errors produced by [`Store`](crate::store::Store) writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("write to `{path}` rejected: observer {observer} is rendering")]
    ReadOnly {
        observer: ObserverId,
        path: AccessPath,
    },

    #[error("`{path}` is not an array")]
    NotAnArray { path: AccessPath },

    #[error("the root must be an object or an array")]
    InvalidRoot,

    #[error(transparent)]
    Path(#[from] PathError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadOnly { .. } => ErrorKind::ReadOnly,
            Self::Path(err) => err.kind(),
            Self::NotAnArray { .. } | Self::InvalidRoot => ErrorKind::Execution,
        }
    }
}

/// Errors converting a [`Value`](crate::value::Value) to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value contains a cycle and cannot be represented as JSON")]
    Cyclic,

    #[error("date cannot be formatted: {0}")]
    Date(String),
}

/// Errors produced by the patch transaction engine.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("test failed at `{path}`: expected {expected}, found {actual}")]
    TestFailed {
        path: AccessPath,
        expected: String,
        actual: String,
    },

    #[error("{op} `{path}`: {reason}")]
    Execution {
        op: &'static str,
        path: AccessPath,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("malformed patch document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("transaction aborted: {0}")]
    Aborted(String),
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TestFailed { .. } => ErrorKind::Validation,
            Self::Store(err) => err.kind(),
            Self::Path(err) => err.kind(),
            Self::Execution { .. } | Self::Decode(_) | Self::Aborted(_) => ErrorKind::Execution,
        }
    }
}
