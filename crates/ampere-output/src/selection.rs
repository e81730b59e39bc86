//! Sign filtering and ordering of attribution groups.

use crate::attribution::AttributionGroup;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which side of the baseline a report is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Groups that raise the prediction
    #[default]
    #[display("positive")]
    Positive,
    /// Groups that lower the prediction
    #[display("negative")]
    Negative,
}

impl Direction {
    /// Whether a mean SHAP value belongs to this direction; zero belongs to neither.
    pub fn matches(self, mean_shap: f64) -> bool {
        match self {
            Self::Positive => mean_shap > 0.0,
            Self::Negative => mean_shap < 0.0,
        }
    }

    /// Verb describing the effect on the prediction.
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Positive => "increase",
            Self::Negative => "decrease",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "pos" | "+" => Ok(Self::Positive),
            "negative" | "neg" | "-" => Ok(Self::Negative),
            other => Err(format!(
                "unknown direction '{other}', expected 'positive' or 'negative'"
            )),
        }
    }
}

/// Groups matching `direction`, most important feature first.
///
/// Within a feature, groups with the larger probability change come first.
/// An empty result is a valid outcome.
pub fn select(groups: &[AttributionGroup], direction: Direction) -> Vec<AttributionGroup> {
    let mut selected: Vec<AttributionGroup> = groups
        .iter()
        .filter(|g| direction.matches(g.mean_shap))
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        a.importance_rank.cmp(&b.importance_rank).then_with(|| {
            b.probability_delta_pct
                .abs()
                .total_cmp(&a.probability_delta_pct.abs())
        })
    });
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::probability_delta_pct;
    use rstest::rstest;

    fn group(feature: &str, label: &str, mean_shap: f64, rank: usize) -> AttributionGroup {
        AttributionGroup {
            feature: feature.to_string(),
            group_label: label.to_string(),
            mean_shap,
            probability_delta_pct: probability_delta_pct(-0.5, mean_shap),
            importance_rank: rank,
            row_count: 1,
        }
    }

    fn groups() -> Vec<AttributionGroup> {
        vec![
            group("usage", "[1, 5]", 0.1, 2),
            group("usage", "(5, 9]", 0.3, 2),
            group("city", "calgary", -0.4, 1),
            group("city", "edmonton", 0.0, 1),
            group("city", "medicine_hat", 0.2, 1),
            group("tenure", "12", -0.1, 3),
        ]
    }

    #[rstest]
    #[case("positive", Direction::Positive)]
    #[case(" Negative ", Direction::Negative)]
    #[case("neg", Direction::Negative)]
    fn test_parse(#[case] text: &str, #[case] expected: Direction) {
        assert_eq!(text.parse::<Direction>().unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_other() {
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Negative.to_string(), "negative");
    }

    #[test]
    fn test_positive_order() {
        let selected = select(&groups(), Direction::Positive);
        let labels: Vec<_> = selected.iter().map(|g| g.group_label.as_str()).collect();
        assert_eq!(labels, vec!["medicine_hat", "(5, 9]", "[1, 5]"]);
    }

    #[test]
    fn test_negative_order() {
        let selected = select(&groups(), Direction::Negative);
        let labels: Vec<_> = selected.iter().map(|g| g.group_label.as_str()).collect();
        assert_eq!(labels, vec!["calgary", "12"]);
    }

    #[test]
    fn test_zero_shap_in_neither_direction() {
        let all = groups();
        let positive = select(&all, Direction::Positive);
        let negative = select(&all, Direction::Negative);
        assert!(!positive.iter().any(|g| g.group_label == "edmonton"));
        assert!(!negative.iter().any(|g| g.group_label == "edmonton"));
        assert_eq!(positive.len() + negative.len() + 1, all.len());
    }

    #[test]
    fn test_empty_selection_is_valid() {
        let only_positive = vec![group("usage", "[1, 5]", 0.1, 1)];
        assert!(select(&only_positive, Direction::Negative).is_empty());
    }
}
