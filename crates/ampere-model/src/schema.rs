//! Feature schema
//!
//! The ordered feature layout a model was trained on. Column order is the
//! ensemble's `feature_names` order and is authoritative: categorical features
//! carry the training-time vocabulary that fixes their category codes.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved bucket for missing and out-of-vocabulary categorical values.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// How a feature is typed in the trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Categorical feature encoded by vocabulary position
    #[display("categorical")]
    Categorical,
    /// Floating-point feature
    #[display("numeric")]
    Numeric,
}

impl FeatureKind {
    /// Parse the single-letter type tag used in ensemble documents.
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "c" => Some(Self::Categorical),
            "q" | "float" | "int" => Some(Self::Numeric),
            _ => None,
        }
    }
}

/// Shared category vocabulary document: feature name to ordered categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VocabularyDocument(pub HashMap<String, Vec<String>>);

impl VocabularyDocument {
    /// Vocabulary for a single feature, if one was trained.
    pub fn get(&self, feature: &str) -> Option<&[String]> {
        self.0.get(feature).map(Vec::as_slice)
    }

    /// Number of features with a vocabulary.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the document is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single feature of the trained schema.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    name: String,
    kind: FeatureKind,
    vocabulary: Option<Vec<String>>,
    codes: HashMap<String, u32>,
}

impl FeatureSpec {
    /// A numeric feature.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Numeric,
            vocabulary: None,
            codes: HashMap::new(),
        }
    }

    /// A categorical feature, optionally with its trained vocabulary.
    pub fn categorical(name: impl Into<String>, vocabulary: Option<Vec<String>>) -> Self {
        let codes = vocabulary
            .iter()
            .flatten()
            .enumerate()
            .map(|(code, category)| (category.clone(), code as u32))
            .collect();
        Self {
            name: name.into(),
            kind: FeatureKind::Categorical,
            vocabulary,
            codes,
        }
    }

    /// Feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature kind.
    pub const fn kind(&self) -> FeatureKind {
        self.kind
    }

    /// Trained vocabulary, in code order.
    pub fn vocabulary(&self) -> Option<&[String]> {
        self.vocabulary.as_deref()
    }

    /// Whether a normalized category is part of the trained vocabulary.
    ///
    /// Features without a vocabulary accept every value.
    pub fn accepts(&self, category: &str) -> bool {
        self.vocabulary.is_none() || self.codes.contains_key(category)
    }

    /// Category code of a normalized value, `None` when it cannot be encoded.
    pub fn code(&self, category: &str) -> Option<u32> {
        self.codes.get(category).copied()
    }
}

/// Ordered feature layout of a model.
#[derive(Debug, Clone, Default)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Build a schema from ordered feature specs.
    pub fn new(features: Vec<FeatureSpec>) -> Self {
        let index = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self { features, index }
    }

    /// Build a schema from ensemble feature names/kinds and the shared vocabulary.
    pub fn from_parts(
        names: &[String],
        kinds: &[FeatureKind],
        vocabulary: &VocabularyDocument,
    ) -> Self {
        let features = names
            .iter()
            .zip(kinds)
            .map(|(name, kind)| match kind {
                FeatureKind::Categorical => FeatureSpec::categorical(
                    name.clone(),
                    vocabulary.get(name).map(<[String]>::to_vec),
                ),
                FeatureKind::Numeric => FeatureSpec::numeric(name.clone()),
            })
            .collect();
        Self::new(features)
    }

    /// Feature specs in model order.
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Feature names in model order.
    pub fn feature_order(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// Position of a feature.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Spec of a feature by name.
    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.index_of(name).map(|i| &self.features[i])
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the schema has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> VocabularyDocument {
        let mut map = HashMap::new();
        map.insert(
            "city".to_string(),
            vec![
                "calgary".to_string(),
                "edmonton".to_string(),
                UNKNOWN_CATEGORY.to_string(),
            ],
        );
        VocabularyDocument(map)
    }

    #[test]
    fn test_codes_follow_vocabulary_order() {
        let schema = FeatureSchema::from_parts(
            &["city".to_string(), "age".to_string()],
            &[FeatureKind::Categorical, FeatureKind::Numeric],
            &vocab(),
        );

        let city = schema.get("city").unwrap();
        assert_eq!(city.code("calgary"), Some(0));
        assert_eq!(city.code(UNKNOWN_CATEGORY), Some(2));
        assert_eq!(city.code("atlantis"), None);
        assert!(!city.accepts("atlantis"));
        assert_eq!(schema.feature_order(), vec!["city", "age"]);
        assert_eq!(schema.index_of("age"), Some(1));
    }

    #[test]
    fn test_categorical_without_vocabulary_accepts_everything() {
        let spec = FeatureSpec::categorical("heating_type", None);
        assert!(spec.accepts("natural_gas"));
        assert_eq!(spec.code("natural_gas"), None);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(FeatureKind::from_type_tag("c"), Some(FeatureKind::Categorical));
        assert_eq!(FeatureKind::from_type_tag("q"), Some(FeatureKind::Numeric));
        assert_eq!(FeatureKind::from_type_tag("x"), None);
        assert_eq!(FeatureKind::Categorical.to_string(), "categorical");
    }
}
