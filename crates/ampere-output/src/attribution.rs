//! SHAP attribution aggregation
//!
//! Condenses an N×F SHAP matrix into per-feature importances and per-group
//! average effects. Numeric features are grouped by quantile bin, categorical
//! features by normalized category. Every observed row lands in exactly one
//! group of every feature.

use crate::binning::{ValueGroup, group_numeric};
use crate::error::{AttributionError, Result};
use ampere_model::{
    CancellationFlag, FeatureColumn, FeatureMatrix, ModelArtifact, ShapValues, sigmoid,
};
use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Probability change, in percentage points, implied by a SHAP shift from the baseline.
///
/// Exactly 0 when `mean_shap` is 0.
pub fn probability_delta_pct(base_value: f64, mean_shap: f64) -> f64 {
    (sigmoid(base_value + mean_shap) - sigmoid(base_value)) * 100.0
}

/// Average effect of one value group of one feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributionGroup {
    /// Feature name
    pub feature: String,
    /// Category or interval label
    pub group_label: String,
    /// Mean SHAP value over the group's rows
    pub mean_shap: f64,
    /// Probability change in percentage points relative to the baseline
    pub probability_delta_pct: f64,
    /// Dense rank of the feature by mean |SHAP|, 1 is most important
    pub importance_rank: usize,
    /// Number of rows in the group
    pub row_count: usize,
}

impl AttributionGroup {
    /// Whether the group pushes the prediction up.
    pub fn is_positive(&self) -> bool {
        self.mean_shap > 0.0
    }

    /// Whether the group pushes the prediction down.
    pub fn is_negative(&self) -> bool {
        self.mean_shap < 0.0
    }

    /// "increases" or "decreases".
    pub fn effect(&self) -> &'static str {
        if self.probability_delta_pct > 0.0 {
            "increases"
        } else {
            "decreases"
        }
    }
}

impl fmt::Display for AttributionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} probability by {:.2}% (SHAP {:.4}, rank {})",
            self.feature,
            self.group_label,
            self.effect(),
            self.probability_delta_pct.abs(),
            self.mean_shap,
            self.importance_rank
        )
    }
}

/// Mean |SHAP| of one feature over a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureImportance {
    /// Feature name
    pub feature: String,
    /// Mean absolute SHAP value
    pub importance: f64,
    /// Dense rank, 1 is most important
    pub rank: usize,
}

/// Grouped attribution of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    /// Raw log-odds baseline
    pub base_value: f64,
    /// Probability at the baseline
    pub base_probability: f64,
    /// Feature importances in model feature order
    pub importances: Vec<FeatureImportance>,
    /// Groups in model feature order, value order within a feature
    pub groups: Vec<AttributionGroup>,
}

impl Explanation {
    /// Groups of one feature.
    pub fn groups_of<'a>(&'a self, feature: &'a str) -> impl Iterator<Item = &'a AttributionGroup> {
        self.groups.iter().filter(move |g| g.feature == feature)
    }
}

/// Compute SHAP values with the artifact's explainer and aggregate them.
///
/// Fails with [`AttributionError::Unavailable`] when the artifact carries no
/// usable explainer.
pub fn explain(
    matrix: &FeatureMatrix,
    artifact: &ModelArtifact,
    cancel: &CancellationFlag,
) -> Result<Explanation> {
    let explainer = artifact
        .explainer()
        .map_err(|reason| AttributionError::Unavailable(reason.to_string()))?;
    let shap = explainer.shap_values(artifact.ensemble(), matrix, cancel)?;
    aggregate(matrix, &shap)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Importance and dense rank per feature; ties keep feature order.
fn rank_features(names: &[String], shap: &ShapValues) -> Vec<FeatureImportance> {
    let importance: Vec<f64> = shap
        .values
        .axis_iter(Axis(1))
        .map(|column| mean(column.iter().map(|v| v.abs())))
        .collect();

    let mut order: Vec<usize> = (0..importance.len()).collect();
    order.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]));

    let mut ranks = vec![0; importance.len()];
    for (position, &feature) in order.iter().enumerate() {
        ranks[feature] = position + 1;
    }

    names
        .iter()
        .zip(importance)
        .zip(ranks)
        .map(|((feature, importance), rank)| FeatureImportance {
            feature: feature.clone(),
            importance,
            rank,
        })
        .collect()
}

fn categorical_groups(labels: &[String], codes: &[Option<u32>]) -> Vec<ValueGroup> {
    let mut by_label: BTreeMap<(u32, &str), Vec<usize>> = BTreeMap::new();
    for (row, (label, code)) in labels.iter().zip(codes).enumerate() {
        by_label
            .entry((code.unwrap_or(u32::MAX), label.as_str()))
            .or_default()
            .push(row);
    }
    by_label
        .into_iter()
        .map(|((_, label), rows)| ValueGroup {
            label: label.to_string(),
            rows,
        })
        .collect()
}

fn group_rows(column: &FeatureColumn) -> Vec<ValueGroup> {
    match column {
        FeatureColumn::Categorical { labels, codes, .. } => categorical_groups(labels, codes),
        FeatureColumn::Numeric { values, .. } => group_numeric(values),
    }
}

/// Aggregate a SHAP matrix over the value groups of every feature.
pub fn aggregate(matrix: &FeatureMatrix, shap: &ShapValues) -> Result<Explanation> {
    let (rows, cols) = shap.values.dim();
    if rows != matrix.n_rows() || cols != matrix.n_cols() {
        return Err(AttributionError::ShapeMismatch {
            expected_rows: matrix.n_rows(),
            expected_cols: matrix.n_cols(),
            rows,
            cols,
        });
    }

    let base_value = shap.base_value;
    let importances = rank_features(&matrix.column_names(), shap);

    let mut groups = Vec::new();
    for ((column, importance), phi) in matrix
        .columns()
        .iter()
        .zip(&importances)
        .zip(shap.values.axis_iter(Axis(1)))
    {
        groups.extend(group_rows(column).into_iter().map(|group| {
            let mean_shap = group_mean(&phi, &group.rows);
            AttributionGroup {
                feature: column.name().to_string(),
                group_label: group.label,
                mean_shap,
                probability_delta_pct: probability_delta_pct(base_value, mean_shap),
                importance_rank: importance.rank,
                row_count: group.rows.len(),
            }
        }));
    }

    debug!(
        rows,
        features = cols,
        groups = groups.len(),
        "aggregated SHAP attributions"
    );

    Ok(Explanation {
        base_value,
        base_probability: sigmoid(base_value),
        importances,
        groups,
    })
}

fn group_mean(phi: &ArrayView1<'_, f64>, rows: &[usize]) -> f64 {
    mean(rows.iter().map(|&row| phi[row]))
}
