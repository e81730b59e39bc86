//! Factor reports.

use crate::attribution::AttributionGroup;
use crate::selection::{Direction, select};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of factors kept in a report unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 15;

/// Ranked factors pushing a model's predictions in one direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorReport {
    /// Model the report explains
    pub model_name: String,
    /// Direction the factors push the prediction
    pub direction: Direction,
    /// Probability at the explainer baseline
    pub base_probability: f64,
    /// Mean predicted probability over the batch
    pub average_probability: f64,
    /// Number of rows scored
    pub sample_count: usize,
    /// Number of matching groups before truncation
    pub total_matching: usize,
    /// Ranked factors
    pub factors: Vec<AttributionGroup>,
    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,
}

fn title_case(name: &str) -> String {
    name.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl FactorReport {
    /// Start building a report.
    pub fn builder() -> FactorReportBuilder {
        FactorReportBuilder::new()
    }

    /// Whether no factor matched the direction.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Format as Markdown for narrative generation and documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "## {} Analysis Results\n\n",
            title_case(&self.model_name)
        ));
        output.push_str(&format!(
            "**Average Prediction Probability:** {:.3} ({:.1}%)\n",
            self.average_probability,
            self.average_probability * 100.0
        ));
        output.push_str(&format!(
            "**Baseline Probability:** {:.3} ({:.1}%)\n",
            self.base_probability,
            self.base_probability * 100.0
        ));
        output.push_str(&format!("**Customers Analyzed:** {}\n", self.sample_count));
        output.push_str(&format!(
            "**Analysis Focus:** Factors that {} the prediction probability\n\n",
            self.direction.verb()
        ));

        if self.factors.is_empty() {
            output.push_str(&format!(
                "No {} contributing factors found for {}.\n",
                self.direction, self.model_name
            ));
            return output;
        }

        output.push_str(&format!(
            "### Top {} Contributing Factors\n\n",
            self.factors.len()
        ));
        for (i, factor) in self.factors.iter().enumerate() {
            output.push_str(&format!(
                "{}. **{}** ({}): {} probability by {:.2}%\n",
                i + 1,
                title_case(&factor.feature),
                factor.group_label,
                factor.effect(),
                factor.probability_delta_pct.abs()
            ));
        }

        output.push_str("\n### Detailed Analysis\n\n");
        output.push_str("| Feature | Group | Probability Change (%) | SHAP Value | Rank |\n");
        output.push_str("|---------|-------|------------------------|------------|------|\n");
        for factor in &self.factors {
            output.push_str(&format!(
                "| {} | {} | {:.3} | {:.3} | {} |\n",
                factor.feature,
                factor.group_label,
                factor.probability_delta_pct,
                factor.mean_shap,
                factor.importance_rank
            ));
        }
        if self.total_matching > self.factors.len() {
            output.push_str(&format!(
                "\n_Showing {} of {} matching groups._\n",
                self.factors.len(),
                self.total_matching
            ));
        }

        output
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\nFactor Report: {} ({})\n",
            self.model_name, self.direction
        ));
        output.push_str(&format!(
            "Samples: {}  Average: {:.2}%  Baseline: {:.2}%\n",
            self.sample_count,
            self.average_probability * 100.0,
            self.base_probability * 100.0
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str(&format!(
            "{:<4} {:<24} {:<22} {:>12} {:>12}\n",
            "Rank", "Feature", "Group", "Change %", "SHAP"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for factor in &self.factors {
            output.push_str(&format!(
                "{:<4} {:<24} {:<22} {:>11.2}% {:>12.4}\n",
                factor.importance_rank,
                factor.feature,
                factor.group_label,
                factor.probability_delta_pct,
                factor.mean_shap
            ));
        }
        if self.factors.is_empty() {
            output.push_str("(no contributing factors)\n");
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "Showing {} of {} matching groups\n",
            self.factors.len(),
            self.total_matching
        ));

        output
    }
}

impl fmt::Display for FactorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} factors for {} ({} samples):",
            self.direction, self.model_name, self.sample_count
        )?;
        writeln!(
            f,
            "  Average Probability: {:.2}%",
            self.average_probability * 100.0
        )?;
        writeln!(
            f,
            "  Baseline Probability: {:.2}%",
            self.base_probability * 100.0
        )?;
        for factor in &self.factors {
            writeln!(f, "    {factor}")?;
        }
        Ok(())
    }
}

/// Builder for creating factor reports.
#[derive(Debug, Clone)]
pub struct FactorReportBuilder {
    model_name: String,
    direction: Direction,
    base_probability: f64,
    average_probability: f64,
    sample_count: usize,
    top_k: Option<usize>,
}

impl Default for FactorReportBuilder {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            direction: Direction::Positive,
            base_probability: 0.0,
            average_probability: 0.0,
            sample_count: 0,
            top_k: Some(DEFAULT_TOP_K),
        }
    }
}

impl FactorReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model name.
    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set the direction.
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the baseline probability.
    pub const fn base_probability(mut self, probability: f64) -> Self {
        self.base_probability = probability;
        self
    }

    /// Set the batch average probability.
    pub const fn average_probability(mut self, probability: f64) -> Self {
        self.average_probability = probability;
        self
    }

    /// Set the number of rows scored.
    pub const fn sample_count(mut self, count: usize) -> Self {
        self.sample_count = count;
        self
    }

    /// Keep at most `k` factors; `None` keeps all.
    pub const fn top_k(mut self, k: Option<usize>) -> Self {
        self.top_k = k;
        self
    }

    /// Select, order and truncate `groups` into a report.
    pub fn build(self, groups: &[AttributionGroup]) -> FactorReport {
        let mut factors = select(groups, self.direction);
        let total_matching = factors.len();
        if let Some(k) = self.top_k {
            factors.truncate(k);
        }

        FactorReport {
            model_name: self.model_name,
            direction: self.direction,
            base_probability: self.base_probability,
            average_probability: self.average_probability,
            sample_count: self.sample_count,
            total_matching,
            factors,
            generated_at: Utc::now(),
        }
    }
}
