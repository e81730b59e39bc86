#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ampere/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod attribution;
pub mod binning;
pub mod error;
pub mod export;
pub mod report;
pub mod selection;

pub use attribution::{
    AttributionGroup, Explanation, FeatureImportance, aggregate, explain, probability_delta_pct,
};
pub use binning::{QuantileBins, ValueGroup, group_numeric};
pub use error::{AttributionError, Result};
pub use export::{ExportError, ExportFormat, Exporter};
pub use report::{DEFAULT_TOP_K, FactorReport, FactorReportBuilder};
pub use selection::{Direction, select};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
