//! Error types for artifact loading and request scoring

use crate::types::assessment::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Startup failure while assembling the [`ArtifactBundle`](crate::models::ArtifactBundle).
///
/// Always fatal: the service refuses to accept traffic without a valid bundle.
#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("artifact `{artifact}` not found at {}", path.display())]
    Missing {
        artifact: &'static str,
        path: PathBuf,
    },

    #[error("failed to read artifact `{artifact}` from {}: {source}", path.display())]
    Unreadable {
        artifact: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact `{artifact}` is malformed: {source}")]
    Malformed {
        artifact: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("inconsistent artifacts: {0}")]
    Inconsistent(String),
}

/// Per-request failure raised by alignment, scoring or explanation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// Aligned vector shape does not match the classifier. Indicates a bug,
    /// never caller input.
    #[error("contract violation: aligned vector has {actual} features, classifier expects {expected}")]
    ContractViolation { expected: usize, actual: usize },

    /// A numeric field carried a value that cannot be read as a number.
    #[error("field `{feature}` expects a number, got {value:?}")]
    InvalidField { feature: String, value: String },
}

impl ScoringError {
    /// Whether the failure is an internal fault rather than a caller error.
    pub fn is_internal(&self) -> bool {
        matches!(self, ScoringError::ContractViolation { .. })
    }

    /// Category reported back to the caller.
    pub fn kind(&self) -> ErrorKind {
        if self.is_internal() {
            ErrorKind::Internal
        } else {
            ErrorKind::InvalidRequest
        }
    }
}
