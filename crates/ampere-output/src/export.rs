//! CSV and JSON export for attribution groups and factor reports.

use crate::attribution::AttributionGroup;
use crate::report::FactorReport;
use crate::selection::Direction;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values, one row per group.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty" | "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for types that can be exported.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// One CSV row of a factor report.
#[derive(Debug, Serialize)]
struct FactorRow<'a> {
    model_name: &'a str,
    direction: Direction,
    feature: &'a str,
    group_label: &'a str,
    mean_shap: f64,
    probability_delta_pct: f64,
    importance_rank: usize,
    row_count: usize,
}

fn write_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

impl Exporter for FactorReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => write_csv(self.factors.iter().map(|group| FactorRow {
                model_name: &self.model_name,
                direction: self.direction,
                feature: &group.feature,
                group_label: &group.group_label,
                mean_shap: group.mean_shap,
                probability_delta_pct: group.probability_delta_pct,
                importance_rank: group.importance_rank,
                row_count: group.row_count,
            })),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for Vec<AttributionGroup> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => write_csv(self),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<AttributionGroup> {
        vec![
            AttributionGroup {
                feature: "city".to_string(),
                group_label: "medicine_hat".to_string(),
                mean_shap: 0.25,
                probability_delta_pct: 6.22,
                importance_rank: 1,
                row_count: 2,
            },
            AttributionGroup {
                feature: "tenure_months".to_string(),
                group_label: "[1, 12]".to_string(),
                mean_shap: -0.1,
                probability_delta_pct: -2.5,
                importance_rank: 2,
                row_count: 1,
            },
        ]
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(
            "pretty-json".parse::<ExportFormat>().unwrap(),
            ExportFormat::PrettyJson
        );
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
    }

    #[test]
    fn test_groups_csv() {
        let csv = groups().export_to_string(ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(
                "feature,group_label,mean_shap,probability_delta_pct,importance_rank,row_count"
            )
        );
        assert_eq!(lines.next(), Some("city,medicine_hat,0.25,6.22,1,2"));
        assert_eq!(lines.next(), Some("tenure_months,\"[1, 12]\",-0.1,-2.5,2,1"));
    }

    #[test]
    fn test_report_csv_rows() {
        let report = FactorReport::builder()
            .model_name("crosssell_hvac")
            .direction(Direction::Positive)
            .sample_count(2)
            .build(&groups());
        let csv = report.export_to_string(ExportFormat::Csv).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("model_name,direction,feature"));
        assert!(csv.contains("crosssell_hvac,positive,city,medicine_hat"));
    }

    #[test]
    fn test_report_json() {
        let report = FactorReport::builder()
            .model_name("churn")
            .direction(Direction::Negative)
            .build(&groups());
        let json = report.export_to_string(ExportFormat::Json).unwrap();
        assert!(json.contains("\"model_name\":\"churn\""));
        assert!(json.contains("\"tenure_months\""));

        let pretty = report.export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(pretty.contains('\n'));
    }
}
