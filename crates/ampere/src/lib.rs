#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ampere/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;

// Re-export sub-crates
pub use ampere_features as features;
pub use ampere_model as model;
pub use ampere_output as output;
pub use ampere_store as store;

pub use config::{CacheConfig, EngineConfig, RetryConfig, default_cache_path};
pub use engine::{Engine, ProductOffer, ProductScore, ScoreOptions, ScoringOutcome};
pub use error::{EngineError, Result};
pub use registry::{ModelEntry, ModelRegistry};

// Re-export the types most callers need
pub use ampere_features::{FeatureFrame, FeatureRecord, RawValue};
pub use ampere_output::{Direction, FactorReport};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
