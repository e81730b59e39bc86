//! Normalized feature matrix
//!
//! An N×F table whose columns follow a model's feature order exactly.
//! Categorical columns keep both the normalized label (used for grouping
//! attributions) and the vocabulary code (used for inference).

use crate::error::{ModelError, Result};
use crate::schema::{FeatureKind, FeatureSchema};
use ndarray::Array2;
use polars::prelude::*;

/// A single normalized column.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColumn {
    /// Categorical column
    Categorical {
        /// Feature name
        name: String,
        /// Normalized category per row
        labels: Vec<String>,
        /// Vocabulary code per row, `None` when the label cannot be encoded
        codes: Vec<Option<u32>>,
    },
    /// Numeric column
    Numeric {
        /// Feature name
        name: String,
        /// Value per row
        values: Vec<f64>,
    },
}

impl FeatureColumn {
    /// Column name.
    pub fn name(&self) -> &str {
        match self {
            Self::Categorical { name, .. } | Self::Numeric { name, .. } => name,
        }
    }

    /// Column kind.
    pub const fn kind(&self) -> FeatureKind {
        match self {
            Self::Categorical { .. } => FeatureKind::Categorical,
            Self::Numeric { .. } => FeatureKind::Numeric,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Categorical { labels, .. } => labels.len(),
            Self::Numeric { values, .. } => values.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Model input value of a row: the category code or the number; NaN marks missing.
    pub fn model_value(&self, row: usize) -> f64 {
        match self {
            Self::Categorical { codes, .. } => codes[row].map_or(f64::NAN, f64::from),
            Self::Numeric { values, .. } => values[row],
        }
    }
}

/// Normalized N×F feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    n_rows: usize,
    columns: Vec<FeatureColumn>,
}

impl FeatureMatrix {
    /// Assemble a matrix from columns of equal length.
    pub fn new(n_rows: usize, columns: Vec<FeatureColumn>) -> Result<Self> {
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(ModelError::InvalidMatrix(format!(
                "column '{}' has {} rows, expected {n_rows}",
                bad.name(),
                bad.len()
            )));
        }
        Ok(Self { n_rows, columns })
    }

    /// Zero-row matrix with the schema's columns.
    pub fn empty(schema: &FeatureSchema) -> Self {
        let columns = schema
            .features()
            .iter()
            .map(|spec| match spec.kind() {
                FeatureKind::Categorical => FeatureColumn::Categorical {
                    name: spec.name().to_string(),
                    labels: Vec::new(),
                    codes: Vec::new(),
                },
                FeatureKind::Numeric => FeatureColumn::Numeric {
                    name: spec.name().to_string(),
                    values: Vec::new(),
                },
            })
            .collect();
        Self { n_rows: 0, columns }
    }

    /// Number of rows.
    pub const fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Columns in order.
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Verify that columns match the schema exactly, in order and kind.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        let expected = schema.feature_order();
        let actual = self.column_names();
        if expected != actual {
            return Err(ModelError::schema_mismatch(&expected, &actual));
        }

        let kinds_match = schema
            .features()
            .iter()
            .zip(&self.columns)
            .all(|(spec, column)| spec.kind() == column.kind());
        if !kinds_match {
            let describe = |name: &str, kind: FeatureKind| format!("{name}:{kind}");
            let expected: Vec<String> = schema
                .features()
                .iter()
                .map(|spec| describe(spec.name(), spec.kind()))
                .collect();
            let actual: Vec<String> = self
                .columns
                .iter()
                .map(|column| describe(column.name(), column.kind()))
                .collect();
            return Err(ModelError::schema_mismatch(&expected, &actual));
        }

        Ok(())
    }

    /// Dense model input: category codes and numbers, NaN for missing.
    pub fn to_dense(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.n_rows, self.columns.len()), |(row, col)| {
            self.columns[col].model_value(row)
        })
    }

    /// Render as a polars DataFrame (labels for categorical columns).
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns = self
            .columns
            .iter()
            .map(|column| match column {
                FeatureColumn::Categorical { name, labels, .. } => {
                    Column::new(name.as_str().into(), labels.clone())
                }
                FeatureColumn::Numeric { name, values } => {
                    Column::new(name.as_str().into(), values.clone())
                }
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}
