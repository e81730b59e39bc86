//! Feature normalization
//!
//! Maps an arbitrary [`FeatureFrame`] onto the exact feature layout a model was
//! trained on. The output column order is always the schema order: extra input
//! columns are ignored, absent features are synthesized with their default.

use crate::error::Result;
use crate::frame::{FeatureFrame, RawValue, normalize_column_name};
use crate::report::{DefaultReason, NormalizationReport};
use ampere_model::{
    FeatureColumn, FeatureKind, FeatureMatrix, FeatureSchema, FeatureSpec, ModelArtifact,
    UNKNOWN_CATEGORY,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Value used for numeric cells that are missing or unusable.
pub const NUMERIC_DEFAULT: f64 = 0.0;

/// A normalized matrix together with what was repaired to build it.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Matrix in the model's feature order
    pub matrix: FeatureMatrix,
    /// Repairs made while normalizing
    pub report: NormalizationReport,
}

/// Normalize a frame for a loaded model.
pub fn normalize(frame: &FeatureFrame, artifact: &ModelArtifact) -> Result<Normalized> {
    normalize_with_schema(frame, artifact.schema())
}

/// Normalize a frame against a feature schema.
pub fn normalize_with_schema(frame: &FeatureFrame, schema: &FeatureSchema) -> Result<Normalized> {
    let n_rows = frame.n_rows();
    let mut report = NormalizationReport::new(n_rows);
    let mut columns = Vec::with_capacity(schema.len());

    for spec in schema.features() {
        let column = match frame.column(spec.name()) {
            Some(cells) => match spec.kind() {
                FeatureKind::Categorical => categorical_column(spec, cells, &mut report),
                FeatureKind::Numeric => numeric_column(spec, cells, &mut report),
            },
            None => {
                debug!(feature = spec.name(), "synthesizing missing feature");
                report.record_missing(spec.name(), spec.kind() == FeatureKind::Numeric);
                synthesized_column(spec, n_rows)
            }
        };
        columns.push(column);
    }

    let used: HashSet<String> = schema
        .features()
        .iter()
        .map(|spec| normalize_column_name(spec.name()))
        .collect();
    report.ignored_columns = frame
        .column_names()
        .iter()
        .filter(|name| !used.contains(*name))
        .cloned()
        .collect();

    info!(
        rows = n_rows,
        defaulted = report.defaulted_cells(),
        synthesized = report.synthesized.len(),
        remapped = report.remapped_cells(),
        ignored = report.ignored_columns.len(),
        "normalized feature frame"
    );

    let matrix = FeatureMatrix::new(n_rows, columns)?;
    Ok(Normalized { matrix, report })
}

/// Normalized category text of a raw cell before vocabulary checks.
pub fn category_label(value: &RawValue) -> String {
    let text = match value {
        RawValue::Null => return UNKNOWN_CATEGORY.to_string(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(x) => format!("{x:?}"),
        RawValue::Text(s) => s.clone(),
    };
    let text = text.trim().to_lowercase();
    if text.is_empty() || text == "nan" {
        UNKNOWN_CATEGORY.to_string()
    } else {
        text
    }
}

/// Numeric value of a raw cell, or the reason it must be defaulted.
pub fn numeric_value(value: &RawValue) -> std::result::Result<f64, DefaultReason> {
    let x = match value {
        RawValue::Null => return Err(DefaultReason::Null),
        RawValue::Bool(b) => return Ok(if *b { 1.0 } else { 0.0 }),
        RawValue::Int(i) => *i as f64,
        RawValue::Float(x) => *x,
        RawValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(DefaultReason::Null);
            }
            s.parse::<f64>().map_err(|_| DefaultReason::Unparseable)?
        }
    };
    if x.is_finite() {
        Ok(x)
    } else {
        Err(DefaultReason::NonFinite)
    }
}

fn categorical_column(
    spec: &FeatureSpec,
    cells: &[RawValue],
    report: &mut NormalizationReport,
) -> FeatureColumn {
    let mut labels = Vec::with_capacity(cells.len());
    let mut codes = Vec::with_capacity(cells.len());
    for value in cells {
        let mut label = category_label(value);
        if label != UNKNOWN_CATEGORY && !spec.accepts(&label) {
            debug!(feature = spec.name(), value = %label, "remapping to unknown");
            report.record_remap(spec.name(), &label);
            label = UNKNOWN_CATEGORY.to_string();
        }
        codes.push(spec.code(&label));
        labels.push(label);
    }
    FeatureColumn::Categorical {
        name: spec.name().to_string(),
        labels,
        codes,
    }
}

fn numeric_column(
    spec: &FeatureSpec,
    cells: &[RawValue],
    report: &mut NormalizationReport,
) -> FeatureColumn {
    let values = cells
        .iter()
        .enumerate()
        .map(|(row, value)| {
            numeric_value(value).unwrap_or_else(|reason| {
                debug!(feature = spec.name(), row, %reason, "defaulting numeric value");
                report.record_default(spec.name(), reason, row);
                NUMERIC_DEFAULT
            })
        })
        .collect();
    FeatureColumn::Numeric {
        name: spec.name().to_string(),
        values,
    }
}

fn synthesized_column(spec: &FeatureSpec, n_rows: usize) -> FeatureColumn {
    match spec.kind() {
        FeatureKind::Categorical => FeatureColumn::Categorical {
            name: spec.name().to_string(),
            labels: vec![UNKNOWN_CATEGORY.to_string(); n_rows],
            codes: vec![spec.code(UNKNOWN_CATEGORY); n_rows],
        },
        FeatureKind::Numeric => FeatureColumn::Numeric {
            name: spec.name().to_string(),
            values: vec![NUMERIC_DEFAULT; n_rows],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RawValue::Null, "unknown")]
    #[case(RawValue::Bool(true), "true")]
    #[case(RawValue::Int(3), "3")]
    #[case(RawValue::Float(3.0), "3.0")]
    #[case(RawValue::Float(f64::NAN), "unknown")]
    #[case(RawValue::Text("  Medicine_Hat ".into()), "medicine_hat")]
    #[case(RawValue::Text("".into()), "unknown")]
    #[case(RawValue::Text("NaN".into()), "unknown")]
    fn test_category_label(#[case] value: RawValue, #[case] expected: &str) {
        assert_eq!(category_label(&value), expected);
    }

    #[rstest]
    #[case(RawValue::Int(4), Ok(4.0))]
    #[case(RawValue::Float(25.7), Ok(25.7))]
    #[case(RawValue::Bool(true), Ok(1.0))]
    #[case(RawValue::Bool(false), Ok(0.0))]
    #[case(RawValue::Text(" 12.5 ".into()), Ok(12.5))]
    #[case(RawValue::Text("abc".into()), Err(DefaultReason::Unparseable))]
    #[case(RawValue::Text("  ".into()), Err(DefaultReason::Null))]
    #[case(RawValue::Null, Err(DefaultReason::Null))]
    #[case(RawValue::Float(f64::INFINITY), Err(DefaultReason::NonFinite))]
    #[case(RawValue::Text("inf".into()), Err(DefaultReason::NonFinite))]
    fn test_numeric_value(
        #[case] value: RawValue,
        #[case] expected: std::result::Result<f64, DefaultReason>,
    ) {
        assert_eq!(numeric_value(&value), expected);
    }

    #[test]
    fn test_categorical_without_vocabulary_is_missing() {
        let spec = FeatureSpec::categorical("segment", None);
        let mut report = NormalizationReport::new(1);
        let column = categorical_column(&spec, &[RawValue::from("Gold")], &mut report);
        assert!(column.model_value(0).is_nan());
        assert!(report.remapped_to_unknown.is_empty());
    }
}
