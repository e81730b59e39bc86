#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ampere/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod artifact;
pub mod ensemble;
pub mod error;
pub mod matrix;
pub mod schema;
pub mod score;
pub mod shap;

pub use artifact::{ExplainerDocument, ModelArtifact};
pub use ensemble::{Ensemble, EnsembleDocument, Node, Tree};
pub use error::{ModelError, Result};
pub use matrix::{FeatureColumn, FeatureMatrix};
pub use schema::{FeatureKind, FeatureSchema, FeatureSpec, UNKNOWN_CATEGORY, VocabularyDocument};
pub use score::{Prediction, average_probability, score, sigmoid};
pub use shap::{CancellationFlag, ShapValues, TreeExplainer};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
