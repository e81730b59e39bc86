//! Error types for attribution.

use thiserror::Error;

/// Result type for attribution operations.
pub type Result<T> = std::result::Result<T, AttributionError>;

/// Errors that can occur while explaining a batch.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// The model has no usable explainer
    #[error("SHAP explainer unavailable: {0}")]
    Unavailable(String),

    /// SHAP values do not line up with the feature matrix
    #[error("SHAP shape mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ShapeMismatch {
        /// Matrix rows
        expected_rows: usize,
        /// Matrix columns
        expected_cols: usize,
        /// SHAP rows
        rows: usize,
        /// SHAP columns
        cols: usize,
    },

    /// SHAP computation failed
    #[error("SHAP computation failed: {0}")]
    Model(#[from] ampere_model::ModelError),
}

impl AttributionError {
    /// Whether the computation was cancelled rather than failing.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Model(ampere_model::ModelError::Cancelled { .. }))
    }
}
