//! Gradient-boosted tree ensembles
//!
//! Ensembles are shipped as JSON documents (see [`EnsembleDocument`]) and
//! validated once when decoded. The decoded [`Ensemble`] is immutable and is
//! shared across scoring requests.

mod tree;

pub use tree::{Node, Tree};

use crate::error::{ModelError, Result};
use crate::schema::FeatureKind;
use serde::{Deserialize, Serialize};

/// Ensemble document format understood by this crate.
pub const FORMAT_VERSION: u32 = 1;

const fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// Serialized form of a tree ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDocument {
    /// Document format version
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    /// Training objective (informational, e.g. "binary:logistic")
    #[serde(default)]
    pub objective: String,
    /// Raw margin added to every prediction
    #[serde(default)]
    pub base_score: f64,
    /// Feature names in model order
    pub feature_names: Vec<String>,
    /// Feature type tags: "c" categorical, "q" numeric
    pub feature_types: Vec<String>,
    /// Trees whose outputs are summed
    pub trees: Vec<Tree>,
}

/// A validated, immutable tree ensemble.
#[derive(Debug, Clone)]
pub struct Ensemble {
    objective: String,
    base_score: f64,
    feature_names: Vec<String>,
    feature_kinds: Vec<FeatureKind>,
    trees: Vec<Tree>,
}

impl Ensemble {
    /// Decode and validate an ensemble from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let document: EnsembleDocument = serde_json::from_slice(bytes)?;
        Self::from_document(document)
    }

    /// Validate a decoded document.
    pub fn from_document(document: EnsembleDocument) -> Result<Self> {
        if document.format_version != FORMAT_VERSION {
            return Err(ModelError::InvalidEnsemble(format!(
                "unsupported format version {}",
                document.format_version
            )));
        }
        if document.feature_names.len() != document.feature_types.len() {
            return Err(ModelError::InvalidEnsemble(format!(
                "{} feature names but {} feature types",
                document.feature_names.len(),
                document.feature_types.len()
            )));
        }
        if !document.base_score.is_finite() {
            return Err(ModelError::InvalidEnsemble(
                "base_score is not finite".to_string(),
            ));
        }

        let feature_kinds = document
            .feature_types
            .iter()
            .map(|tag| {
                FeatureKind::from_type_tag(tag).ok_or_else(|| {
                    ModelError::InvalidEnsemble(format!("unknown feature type tag '{tag}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut seen = std::collections::HashSet::new();
        if let Some(duplicate) = document
            .feature_names
            .iter()
            .find(|name| !seen.insert(name.as_str()))
        {
            return Err(ModelError::InvalidEnsemble(format!(
                "duplicate feature name '{duplicate}'"
            )));
        }

        let categorical: Vec<bool> = feature_kinds
            .iter()
            .map(|kind| *kind == FeatureKind::Categorical)
            .collect();
        let mut trees = document.trees;
        for (index, tree) in trees.iter_mut().enumerate() {
            tree.validate(index, &categorical)
                .map_err(ModelError::InvalidEnsemble)?;
        }

        Ok(Self {
            objective: document.objective,
            base_score: document.base_score,
            feature_names: document.feature_names,
            feature_kinds,
            trees,
        })
    }

    /// Serialize back into the document form.
    pub fn to_document(&self) -> EnsembleDocument {
        EnsembleDocument {
            format_version: FORMAT_VERSION,
            objective: self.objective.clone(),
            base_score: self.base_score,
            feature_names: self.feature_names.clone(),
            feature_types: self
                .feature_kinds
                .iter()
                .map(|kind| match kind {
                    FeatureKind::Categorical => "c".to_string(),
                    FeatureKind::Numeric => "q".to_string(),
                })
                .collect(),
            trees: self.trees.clone(),
        }
    }

    /// Training objective.
    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Raw margin added to every prediction.
    pub const fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Feature names in model order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Feature kinds in model order.
    pub fn feature_kinds(&self) -> &[FeatureKind] {
        &self.feature_kinds
    }

    /// Number of features.
    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Trees of the ensemble.
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Raw log-odds for one row in model feature order.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>()
    }

    /// Cover-weighted expected raw output over the training distribution.
    pub fn expected_value(&self) -> f64 {
        self.base_score + self.trees.iter().map(Tree::expected_value).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DOC: &str = r#"{
        "format_version": 1,
        "objective": "binary:logistic",
        "base_score": 0.1,
        "feature_names": ["city", "usage"],
        "feature_types": ["c", "q"],
        "trees": [
            {"nodes": [
                {"kind": "categorical", "feature": 0, "categories": [1], "left": 1, "right": 2, "default_left": true, "cover": 10.0},
                {"kind": "leaf", "value": -0.5, "cover": 6.0},
                {"kind": "leaf", "value": 0.5, "cover": 4.0}
            ]},
            {"nodes": [
                {"kind": "numeric", "feature": 1, "threshold": 20.0, "left": 1, "right": 2, "cover": 10.0},
                {"kind": "leaf", "value": 0.2, "cover": 5.0},
                {"kind": "leaf", "value": -0.2, "cover": 5.0}
            ]}
        ]
    }"#;

    #[test]
    fn test_decode_and_predict() {
        let ensemble = Ensemble::from_slice(DOC.as_bytes()).unwrap();
        assert_eq!(ensemble.num_features(), 2);
        assert_eq!(ensemble.trees().len(), 2);
        assert_relative_eq!(ensemble.predict_row(&[1.0, 25.7]), 0.1 + 0.5 - 0.2);
        assert_relative_eq!(ensemble.predict_row(&[0.0, 3.0]), 0.1 - 0.5 + 0.2);
    }

    #[test]
    fn test_expected_value() {
        let ensemble = Ensemble::from_slice(DOC.as_bytes()).unwrap();
        let expected = 0.1 + (6.0 * -0.5 + 4.0 * 0.5) / 10.0 + 0.0;
        assert_relative_eq!(ensemble.expected_value(), expected);
    }

    #[test]
    fn test_rejects_mismatched_types() {
        let mut doc: EnsembleDocument = serde_json::from_str(DOC).unwrap();
        doc.feature_types.pop();
        assert!(matches!(
            Ensemble::from_document(doc),
            Err(ModelError::InvalidEnsemble(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_feature_names() {
        let mut doc: EnsembleDocument = serde_json::from_str(DOC).unwrap();
        doc.feature_names[1] = "city".to_string();
        assert!(Ensemble::from_document(doc).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Ensemble::from_slice(b"\x80\x04pickle"),
            Err(ModelError::Serialization(_))
        ));
    }

    #[test]
    fn test_document_round_trip_preserves_predictions() {
        let ensemble = Ensemble::from_slice(DOC.as_bytes()).unwrap();
        let again = Ensemble::from_document(ensemble.to_document()).unwrap();
        assert_relative_eq!(
            again.predict_row(&[1.0, 3.0]),
            ensemble.predict_row(&[1.0, 3.0])
        );
    }
}
