//! Store paths of model artifacts.

use serde::{Deserialize, Serialize};

/// Deterministic path scheme for the blobs of each model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactLayout {
    /// Directory holding serialized ensembles
    pub models_dir: String,
    /// Directory holding explainer documents
    pub explainers_dir: String,
    /// Path of the shared category vocabulary
    pub vocabulary_path: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            explainers_dir: "shap_explainer".to_string(),
            vocabulary_path: "categories/train_categories.json".to_string(),
        }
    }
}

impl ArtifactLayout {
    /// Path of a model's ensemble.
    pub fn ensemble_path(&self, model_name: &str) -> String {
        format!("{}/{model_name}_model.json", self.models_dir)
    }

    /// Path of a model's explainer document.
    pub fn explainer_path(&self, model_name: &str) -> String {
        format!("{}/{model_name}_shap_explainer.json", self.explainers_dir)
    }

    /// Path of the shared vocabulary.
    pub fn vocabulary_path(&self) -> &str {
        &self.vocabulary_path
    }

    /// Every path belonging to a model, vocabulary excluded.
    pub fn model_paths(&self, model_name: &str) -> [String; 2] {
        [
            self.ensemble_path(model_name),
            self.explainer_path(model_name),
        ]
    }
}
