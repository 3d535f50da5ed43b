//! Error types for the Fusion Access reconciler
//!
//! Provides structured error types for resource watches, remote mutations,
//! minimum-requirement validation and the REST surface.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the reconciler
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    #[error("Watch failed for {kind}: {reason}")]
    WatchFailed { kind: String, reason: String },

    // =========================================================================
    // Mutation Errors
    // =========================================================================
    #[error("Node not found: {node}")]
    NodeNotFound { node: String },

    #[error("A storage role change is already in flight for node {node}")]
    MutationInFlight { node: String },

    #[error("Mutation of {kind}/{name} failed: {reason}")]
    MutationFailed {
        kind: String,
        name: String,
        reason: String,
    },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Minimum requirements not met: {0}")]
    RequirementsNotMet(String),

    #[error("Invalid filesystem name {name:?}: {reason}")]
    InvalidFilesystemName { name: String, reason: String },

    #[error("No LUNs selected")]
    NoLunsSelected,

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action to take on error at a call site that may retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Retry with exponential backoff
    RequeueWithBackoff,
    /// Retry after specific duration
    RequeueAfter(Duration),
    /// Don't retry, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Kube(_) | Error::WatchFailed { .. } => ErrorAction::RequeueWithBackoff,

            // Another request owns the node - wait for it
            Error::MutationInFlight { .. } => ErrorAction::RequeueAfter(Duration::from_secs(5)),

            // Cluster state has to change before this can pass
            Error::RequirementsNotMet(_) | Error::NoLunsSelected => {
                ErrorAction::RequeueAfter(Duration::from_secs(30))
            }

            // Configuration/validation errors - don't retry automatically
            Error::Configuration(_)
            | Error::InvalidFilesystemName { .. }
            | Error::ResourceExists { .. }
            | Error::JsonParse(_)
            | Error::Yaml(_) => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Kube(_) | Error::WatchFailed { .. })
    }
}

/// Result type alias for the reconciler
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::MutationInFlight {
            node: "worker-0".into(),
        };
        assert_eq!(err.action(), ErrorAction::RequeueAfter(Duration::from_secs(5)));

        let err = Error::Configuration("bad config".into());
        assert_eq!(err.action(), ErrorAction::NoRequeue);

        let err = Error::RequirementsNotMet("need 3 nodes".into());
        assert_eq!(err.action(), ErrorAction::RequeueAfter(Duration::from_secs(30)));
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::WatchFailed {
            kind: "LocalDisk".into(),
            reason: "connection reset".into(),
        };
        assert!(transient.is_retryable());
        assert!(transient.is_transient());

        let invalid = Error::InvalidFilesystemName {
            name: "Bad_Name".into(),
            reason: "uppercase".into(),
        };
        assert!(!invalid.is_retryable());
        assert!(!invalid.is_transient());
    }
}
