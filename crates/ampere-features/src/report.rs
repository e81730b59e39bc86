//! Normalization diagnostics
//!
//! Defaulting a numeric cell to 0 is a business rule, not an error, but it has
//! to be visible to the caller. [`NormalizationReport`] records every such
//! decision made while building a feature matrix.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Maximum number of row indices kept per defaulted feature.
pub const MAX_SAMPLE_ROWS: usize = 10;

/// Maximum number of distinct original values kept per remapped feature.
pub const MAX_REMAP_EXAMPLES: usize = 5;

/// Why a numeric cell was replaced by its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultReason {
    /// The input had no such column
    #[display("missing_column")]
    MissingColumn,
    /// The cell was null
    #[display("null")]
    Null,
    /// The text could not be parsed as a number
    #[display("unparseable")]
    Unparseable,
    /// The number was NaN or infinite
    #[display("non_finite")]
    NonFinite,
}

/// Cells of one numeric feature defaulted for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultedField {
    /// Feature name
    pub feature: String,
    /// Reason for defaulting
    pub reason: DefaultReason,
    /// Number of affected cells
    pub count: usize,
    /// First few affected row indices
    pub sample_rows: Vec<usize>,
}

/// Categorical values of one feature remapped to the unknown bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemappedCategory {
    /// Feature name
    pub feature: String,
    /// Number of affected cells
    pub count: usize,
    /// First few distinct original values
    pub examples: Vec<String>,
}

/// What the normalizer had to repair or discard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    /// Rows normalized
    pub rows: usize,
    /// Numeric cells replaced by the default
    pub defaulted: Vec<DefaultedField>,
    /// Features absent from the input and synthesized
    pub synthesized: Vec<String>,
    /// Categorical values outside the trained vocabulary
    pub remapped_to_unknown: Vec<RemappedCategory>,
    /// Input columns the model does not use
    pub ignored_columns: Vec<String>,
}

impl NormalizationReport {
    /// A report for `rows` rows with nothing recorded yet.
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Whether the input mapped onto the schema without any repair.
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty()
            && self.synthesized.is_empty()
            && self.remapped_to_unknown.is_empty()
    }

    /// Total number of defaulted numeric cells.
    pub fn defaulted_cells(&self) -> usize {
        self.defaulted.iter().map(|d| d.count).sum()
    }

    /// Total number of categorical cells remapped to unknown.
    pub fn remapped_cells(&self) -> usize {
        self.remapped_to_unknown.iter().map(|r| r.count).sum()
    }

    /// Entry for a feature and reason, if any.
    pub fn defaulted_for(&self, feature: &str, reason: DefaultReason) -> Option<&DefaultedField> {
        self.defaulted
            .iter()
            .find(|d| d.feature == feature && d.reason == reason)
    }

    /// Record a defaulted cell.
    pub fn record_default(&mut self, feature: &str, reason: DefaultReason, row: usize) {
        match self
            .defaulted
            .iter_mut()
            .find(|d| d.feature == feature && d.reason == reason)
        {
            Some(entry) => {
                entry.count += 1;
                if entry.sample_rows.len() < MAX_SAMPLE_ROWS {
                    entry.sample_rows.push(row);
                }
            }
            None => self.defaulted.push(DefaultedField {
                feature: feature.to_string(),
                reason,
                count: 1,
                sample_rows: vec![row],
            }),
        }
    }

    /// Record a missing feature defaulted for every row.
    pub fn record_missing(&mut self, feature: &str, numeric: bool) {
        self.synthesized.push(feature.to_string());
        if numeric && self.rows > 0 {
            self.defaulted.push(DefaultedField {
                feature: feature.to_string(),
                reason: DefaultReason::MissingColumn,
                count: self.rows,
                sample_rows: (0..self.rows.min(MAX_SAMPLE_ROWS)).collect(),
            });
        }
    }

    /// Record a categorical value remapped to unknown.
    pub fn record_remap(&mut self, feature: &str, original: &str) {
        let entry = match self
            .remapped_to_unknown
            .iter()
            .position(|r| r.feature == feature)
        {
            Some(i) => &mut self.remapped_to_unknown[i],
            None => {
                self.remapped_to_unknown.push(RemappedCategory {
                    feature: feature.to_string(),
                    count: 0,
                    examples: Vec::new(),
                });
                let last = self.remapped_to_unknown.len() - 1;
                &mut self.remapped_to_unknown[last]
            }
        };
        entry.count += 1;
        if entry.examples.len() < MAX_REMAP_EXAMPLES && !entry.examples.iter().any(|e| e == original)
        {
            entry.examples.push(original.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_display() {
        assert_eq!(DefaultReason::MissingColumn.to_string(), "missing_column");
        assert_eq!(DefaultReason::NonFinite.to_string(), "non_finite");
        assert_eq!(
            serde_json::to_string(&DefaultReason::Unparseable).unwrap(),
            "\"unparseable\""
        );
    }

    #[test]
    fn test_record_default_caps_samples() {
        let mut report = NormalizationReport::new(20);
        for row in 0..20 {
            report.record_default("age", DefaultReason::Null, row);
        }
        let entry = report.defaulted_for("age", DefaultReason::Null).unwrap();
        assert_eq!(entry.count, 20);
        assert_eq!(entry.sample_rows.len(), MAX_SAMPLE_ROWS);
        assert_eq!(report.defaulted_cells(), 20);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_record_remap_keeps_distinct_examples() {
        let mut report = NormalizationReport::new(3);
        report.record_remap("city", "atlantis");
        report.record_remap("city", "atlantis");
        report.record_remap("city", "el_dorado");
        assert_eq!(report.remapped_to_unknown.len(), 1);
        assert_eq!(report.remapped_cells(), 3);
        assert_eq!(report.remapped_to_unknown[0].examples, vec!["atlantis", "el_dorado"]);
    }

    #[test]
    fn test_missing_categorical_is_only_synthesized() {
        let mut report = NormalizationReport::new(2);
        report.record_missing("city", false);
        report.record_missing("age", true);
        assert_eq!(report.synthesized, vec!["city", "age"]);
        assert_eq!(report.defaulted.len(), 1);
        assert_eq!(report.defaulted[0].count, 2);
    }

    #[test]
    fn test_empty_report_is_clean() {
        assert!(NormalizationReport::new(0).is_clean());
    }
}
