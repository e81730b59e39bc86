#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ampere/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod frame;
pub mod normalize;
pub mod report;

pub use error::{NormalizeError, Result};
pub use frame::{FeatureFrame, FeatureRecord, RawValue, normalize_column_name};
pub use normalize::{Normalized, category_label, normalize, normalize_with_schema, numeric_value};
pub use report::{DefaultReason, DefaultedField, NormalizationReport, RemappedCategory};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
