//! Error types for input framing and normalization.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Errors that can occur while framing or normalizing input records.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Input does not have a tabular shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model error while assembling the matrix
    #[error("Model error: {0}")]
    Model(#[from] ampere_model::ModelError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
