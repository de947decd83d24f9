//! Error types for reconciliation
//!
//! Errors are split by when they can happen:
//! - [`SchemaError`] - the schema itself is malformed (a programming error)
//! - [`ValidationError`] - the caller's configuration violates the schema;
//!   always raised before any callback runs
//! - [`ConvertError`] - a native object could not be flattened
//! - [`ReconcileError`] - anything surfaced from a reconciliation cycle

use crate::types::Operation;
use thiserror::Error;

/// The configuration violates the schema at `path`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct ValidationError {
    /// Attribute path the violation was found at
    pub path: String,
    /// What is wrong with the value
    pub reason: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// The schema definition is inconsistent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema at {path}: {reason}")]
pub struct SchemaError {
    pub path: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A native object does not match the schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {path}: {reason}")]
pub struct ConvertError {
    pub path: String,
    pub reason: String,
}

impl ConvertError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by a reconciliation cycle
///
/// None of these abort persistence: the cycle still returns the state that
/// is known to be durable alongside the error.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Configuration rejected before any callback ran
    #[error("invalid configuration at {}: {}", .0.path, .0.reason)]
    Validation(#[from] ValidationError),

    /// Schema definition is malformed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An operation callback returned an error
    #[error("{operation} failed: {source}")]
    Callback {
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    /// A callback left state the orchestrator will not normalize silently
    #[error("{operation} left inconsistent state: {reason}")]
    InconsistentState { operation: Operation, reason: String },

    /// Prior state could not be upgraded to the current schema version
    #[error("state migration from schema version {from} failed: {source}")]
    Migration {
        from: u64,
        #[source]
        source: anyhow::Error,
    },

    /// Loading or saving durable state failed
    #[error("state store error for {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ReconcileError {
    pub(crate) fn callback(operation: Operation, source: anyhow::Error) -> Self {
        Self::Callback { operation, source }
    }

    pub(crate) fn inconsistent(operation: Operation, reason: impl Into<String>) -> Self {
        Self::InconsistentState {
            operation,
            reason: reason.into(),
        }
    }

    /// Attribute path this error is scoped to, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Validation(e) => Some(&e.path),
            Self::Schema(e) => Some(&e.path),
            _ => None,
        }
    }

    /// Whether the error came from an operation callback
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback { .. })
    }

    /// Operation the error is attributed to, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Callback { operation, .. } | Self::InconsistentState { operation, .. } => {
                Some(*operation)
            }
            _ => None,
        }
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_is_path_scoped() {
        let err = ReconcileError::from(ValidationError::new("address", "required attribute is missing"));
        assert_eq!(err.path(), Some("address"));
        assert_eq!(
            err.to_string(),
            "invalid configuration at address: required attribute is missing"
        );
    }

    #[test]
    fn test_callback_error_keeps_source() {
        let err = ReconcileError::callback(Operation::Create, anyhow::anyhow!("quota exceeded"));
        assert!(err.is_callback());
        assert_eq!(err.operation(), Some(Operation::Create));
        assert_eq!(err.to_string(), "create failed: quota exceeded");
        assert!(std::error::Error::source(&err).is_some());
    }
}
