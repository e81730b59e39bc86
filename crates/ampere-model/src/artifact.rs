//! Model artifacts
//!
//! A [`ModelArtifact`] bundles everything needed to score and explain one
//! model: the ensemble, its feature schema (with trained vocabularies) and,
//! when available, the explainer carrying the attribution baseline. Artifacts
//! are immutable once built and shared behind `Arc`.

use crate::ensemble::Ensemble;
use crate::schema::{FeatureSchema, VocabularyDocument};
use crate::shap::{PATH_DEPENDENT, TreeExplainer};
use serde::{Deserialize, Serialize};
use tracing::warn;

fn default_algorithm() -> String {
    PATH_DEPENDENT.to_string()
}

/// Serialized explainer, persisted next to the ensemble it was built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerDocument {
    /// Model the explainer was built for
    pub model_name: String,
    /// Explanation algorithm
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Raw log-odds baseline (expected model output)
    pub base_value: f64,
    /// Tree count of the bound ensemble
    pub num_trees: usize,
    /// Feature order of the bound ensemble
    pub feature_names: Vec<String>,
}

/// Everything needed to score and explain one model.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    model_name: String,
    ensemble: Ensemble,
    schema: FeatureSchema,
    explainer: Result<TreeExplainer, String>,
}

impl ModelArtifact {
    /// Build an artifact without an explainer.
    pub fn new(model_name: impl Into<String>, ensemble: Ensemble, vocabulary: &VocabularyDocument) -> Self {
        let schema = FeatureSchema::from_parts(
            ensemble.feature_names(),
            ensemble.feature_kinds(),
            vocabulary,
        );
        Self {
            model_name: model_name.into(),
            ensemble,
            schema,
            explainer: Err("no explainer loaded".to_string()),
        }
    }

    /// Attach an explainer document; a document bound to another ensemble
    /// leaves the artifact without an explainer and records why.
    pub fn with_explainer(mut self, document: &ExplainerDocument) -> Self {
        self.explainer = TreeExplainer::bind(&self.ensemble, document).map_err(|e| {
            warn!(model = %self.model_name, error = %e, "explainer rejected");
            e.to_string()
        });
        self
    }

    /// Record why no explainer is available.
    pub fn without_explainer(mut self, reason: impl Into<String>) -> Self {
        self.explainer = Err(reason.into());
        self
    }

    /// Model name.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Tree ensemble.
    pub const fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// Feature schema.
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Feature names in model order.
    pub fn feature_order(&self) -> Vec<String> {
        self.schema.feature_order()
    }

    /// Bound explainer, or the reason it is unavailable.
    pub fn explainer(&self) -> Result<&TreeExplainer, &str> {
        self.explainer.as_ref().map_err(String::as_str)
    }

    /// Attribution baseline, when an explainer is bound.
    pub fn base_value(&self) -> Option<f64> {
        self.explainer.as_ref().ok().map(TreeExplainer::base_value)
    }
}
