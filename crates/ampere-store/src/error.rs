//! Error types for storage and artifact loading.

use std::time::Duration;
use thiserror::Error;

/// Result type for artifact operations.
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Result type for object store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by object stores and the blob cache.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object at this path
    #[error("Object not found: {path}")]
    NotFound {
        /// Store path
        path: String,
    },

    /// The store refused access
    #[error("Permission denied for {path}: {reason}")]
    PermissionDenied {
        /// Store path
        path: String,
        /// Reason reported by the store
        reason: String,
    },

    /// A failure that may succeed on retry
    #[error("Transient store error for {path}: {reason}")]
    Transient {
        /// Store path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Request failed for a reason that will not go away on retry
    #[error("Request error for {path}: {reason}")]
    Request {
        /// Store path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// Invalid store configuration
    #[error("Invalid store configuration: {0}")]
    Config(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob cache database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Blob cache unusable
    #[error("Cache error: {0}")]
    Cache(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether the object does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while loading a model artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// A required blob is missing
    #[error("Artifact not found: {path}")]
    NotFound {
        /// Store path of the missing blob
        path: String,
    },

    /// A blob exists but cannot be deserialized
    #[error("Artifact corrupt at {path}: {reason}")]
    Corrupt {
        /// Store path of the blob
        path: String,
        /// Deserialization failure
        reason: String,
    },

    /// The load did not finish in time
    #[error("Loading artifact for model '{model}' timed out after {timeout:?}")]
    LoadTimeout {
        /// Model name
        model: String,
        /// Timeout that expired
        timeout: Duration,
    },

    /// Store failure other than a missing blob
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ArtifactError {
    pub(crate) fn from_store(path: &str, error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => Self::NotFound {
                path: path.to_string(),
            },
            other => Self::Store(other),
        }
    }

    pub(crate) fn corrupt(path: &str, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
