//! SHAP explanations for tree ensembles
//!
//! [`TreeExplainer`] computes exact path-dependent TreeSHAP values. Rows are
//! explained in parallel; a [`CancellationFlag`] is checked before the pass and
//! before every row so callers can abort expensive batches.

mod tree_shap;

use crate::artifact::ExplainerDocument;
use crate::ensemble::Ensemble;
use crate::error::{ModelError, Result};
use crate::matrix::FeatureMatrix;
use ndarray::{Array2, Zip};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Explanation algorithm implemented by [`TreeExplainer`].
pub const PATH_DEPENDENT: &str = "tree_path_dependent";

/// Tolerance for the stored base value against the ensemble's expected value.
const BASE_VALUE_DRIFT_TOLERANCE: f64 = 1e-3;

/// Cooperative cancellation shared between a caller and a computation.
///
/// Clones share one flag. A [`child`](Self::child) flag also reports every
/// ancestor's cancellation, but raising it leaves the ancestors untouched.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    raised: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancellationFlag {
    /// A flag that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh flag that is also cancelled whenever `self` is.
    pub fn child(&self) -> Self {
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(Arc::clone(&self.raised));
        ancestors.extend(self.ancestors.iter().cloned());
        Self {
            raised: Arc::new(AtomicBool::new(false)),
            ancestors,
        }
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.raised.store(true, Ordering::Relaxed);
    }

    /// Whether this flag or any ancestor has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::Relaxed)
            || self
                .ancestors
                .iter()
                .any(|flag| flag.load(Ordering::Relaxed))
    }
}

/// SHAP matrix of a batch.
#[derive(Debug, Clone)]
pub struct ShapValues {
    /// N×F attributions in model feature order
    pub values: Array2<f64>,
    /// Raw log-odds baseline the attributions are relative to
    pub base_value: f64,
}

/// Path-dependent TreeSHAP explainer bound to one ensemble.
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    base_value: f64,
    num_trees: usize,
    feature_names: Vec<String>,
}

impl TreeExplainer {
    /// Bind an explainer document to the ensemble it was built for.
    pub fn bind(ensemble: &Ensemble, document: &ExplainerDocument) -> Result<Self> {
        if document.algorithm != PATH_DEPENDENT {
            return Err(ModelError::ExplainerMismatch(format!(
                "unsupported algorithm '{}'",
                document.algorithm
            )));
        }
        if document.num_trees != ensemble.trees().len() {
            return Err(ModelError::ExplainerMismatch(format!(
                "explainer built for {} trees, ensemble has {}",
                document.num_trees,
                ensemble.trees().len()
            )));
        }
        if document.feature_names != ensemble.feature_names() {
            return Err(ModelError::ExplainerMismatch(
                "explainer feature names differ from the ensemble".to_string(),
            ));
        }
        if !document.base_value.is_finite() {
            return Err(ModelError::ExplainerMismatch(
                "base value is not finite".to_string(),
            ));
        }

        let expected = ensemble.expected_value();
        if (expected - document.base_value).abs() > BASE_VALUE_DRIFT_TOLERANCE {
            warn!(
                model = %document.model_name,
                stored = document.base_value,
                computed = expected,
                "explainer base value drifts from the ensemble expected value"
            );
        }

        Ok(Self {
            base_value: document.base_value,
            num_trees: document.num_trees,
            feature_names: document.feature_names.clone(),
        })
    }

    /// Raw log-odds baseline.
    pub const fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Number of trees the explainer was built for.
    pub const fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Compute the N×F SHAP matrix for a normalized batch.
    pub fn shap_values(
        &self,
        ensemble: &Ensemble,
        matrix: &FeatureMatrix,
        cancel: &CancellationFlag,
    ) -> Result<ShapValues> {
        let n_rows = matrix.n_rows();
        let n_features = self.feature_names.len();
        if matrix.column_names() != self.feature_names {
            return Err(ModelError::schema_mismatch(
                &self.feature_names,
                &matrix.column_names(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(ModelError::Cancelled {
                completed_rows: 0,
                total_rows: n_rows,
            });
        }

        let input = matrix.to_dense();
        let mut values = Array2::<f64>::zeros((n_rows, n_features));
        let completed = AtomicUsize::new(0);

        Zip::from(values.rows_mut())
            .and(input.rows())
            .par_for_each(|mut phi_row, x_row| {
                if cancel.is_cancelled() {
                    return;
                }
                let x = x_row.to_vec();
                let mut phi = vec![0.0; n_features];
                for tree in ensemble.trees() {
                    tree_shap::accumulate(tree, &x, &mut phi);
                }
                for (dst, src) in phi_row.iter_mut().zip(&phi) {
                    *dst = *src;
                }
                completed.fetch_add(1, Ordering::Relaxed);
            });

        let completed_rows = completed.into_inner();
        if completed_rows < n_rows {
            return Err(ModelError::Cancelled {
                completed_rows,
                total_rows: n_rows,
            });
        }

        debug!(rows = n_rows, features = n_features, "computed SHAP values");
        Ok(ShapValues {
            values,
            base_value: self.base_value,
        })
    }
}
