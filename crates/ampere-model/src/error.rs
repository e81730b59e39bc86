//! Error types for model operations.

use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while decoding, scoring or explaining a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The feature matrix does not have the columns the model was trained on
    #[error(
        "Feature schema mismatch: expected {expected:?}, got {actual:?} (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    FeatureSchemaMismatch {
        /// Columns the model expects, in order
        expected: Vec<String>,
        /// Columns that were supplied, in order
        actual: Vec<String>,
        /// Expected columns absent from the input
        missing: Vec<String>,
        /// Supplied columns the model does not know
        unexpected: Vec<String>,
    },

    /// The ensemble document is structurally invalid
    #[error("Invalid ensemble: {0}")]
    InvalidEnsemble(String),

    /// A feature matrix was assembled from inconsistent columns
    #[error("Invalid feature matrix: {0}")]
    InvalidMatrix(String),

    /// The explainer is not bound to this ensemble
    #[error("Explainer mismatch: {0}")]
    ExplainerMismatch(String),

    /// A long-running computation observed its cancellation flag
    #[error("Computation cancelled after {completed_rows} of {total_rows} rows")]
    Cancelled {
        /// Rows fully processed before the flag was observed
        completed_rows: usize,
        /// Rows in the batch
        total_rows: usize,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// Build a schema mismatch error with the column diff filled in.
    pub fn schema_mismatch(expected: &[String], actual: &[String]) -> Self {
        let missing = expected
            .iter()
            .filter(|name| !actual.contains(name))
            .cloned()
            .collect();
        let unexpected = actual
            .iter()
            .filter(|name| !expected.contains(name))
            .cloned()
            .collect();
        Self::FeatureSchemaMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
            missing,
            unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_diff() {
        let expected = vec!["city".to_string(), "age".to_string()];
        let actual = vec!["age".to_string(), "zip".to_string()];

        match ModelError::schema_mismatch(&expected, &actual) {
            ModelError::FeatureSchemaMismatch {
                missing,
                unexpected,
                ..
            } => {
                assert_eq!(missing, vec!["city".to_string()]);
                assert_eq!(unexpected, vec!["zip".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reordered_columns_have_empty_diff() {
        let expected = vec!["a".to_string(), "b".to_string()];
        let actual = vec!["b".to_string(), "a".to_string()];
        let err = ModelError::schema_mismatch(&expected, &actual);
        assert!(err.to_string().contains("missing: []"));
    }
}
