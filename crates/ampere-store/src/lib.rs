#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ampere/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod artifacts;
pub mod cache;
pub mod error;
pub mod store;

pub use artifacts::{ArtifactLayout, ArtifactRepository};
pub use cache::{BlobCache, CacheStats, CachedStore};
pub use error::{ArtifactError, Result, StoreError, StoreResult};
pub use store::{
    HttpStore, LocalStore, MemoryStore, ObjectStore, RetryPolicy, RetryingStore, StoreConfig,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
