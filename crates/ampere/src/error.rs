//! Error types for the engine.

use ampere_features::NormalizeError;
use ampere_model::ModelError;
use ampere_output::AttributionError;
use ampere_store::{ArtifactError, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort an engine call.
///
/// Explainer problems are not listed here: scoring absorbs them into a
/// warning field of the outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Artifact could not be loaded
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Object store could not be set up
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Input could not be framed or normalized
    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Scoring failed
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Attribution failed
    #[error("Attribution error: {0}")]
    Attribution(#[from] AttributionError),

    /// SHAP computation exceeded its time budget
    #[error("Explanation of {model} timed out after {timeout:?}")]
    ExplainTimeout {
        /// Model being explained
        model: String,
        /// Configured budget
        timeout: Duration,
    },

    /// Computation was cancelled by the caller
    #[error("Explanation of {model} was cancelled")]
    Cancelled {
        /// Model being explained
        model: String,
    },

    /// Model is not part of the deployment
    #[error("Unknown model '{model}', expected one of: {}", known.join(", "))]
    UnknownModel {
        /// Requested model
        model: String,
        /// Models the deployment knows
        known: Vec<String>,
    },

    /// No model backs the product
    #[error("Unknown product '{0}'")]
    UnknownProduct(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task failed
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EngineError {
    /// Whether the error is a timeout of either the load or the explanation.
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ExplainTimeout { .. } | Self::Artifact(ArtifactError::LoadTimeout { .. })
        )
    }
}
