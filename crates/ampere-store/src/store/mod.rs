//! Object store backends
//!
//! Artifacts live in a bucket-like store addressed by slash-separated paths.
//! Every backend classifies its failures the same way so the retry layer can
//! tell transient errors from permanent ones.

pub mod http;
pub mod local;
pub mod memory;
pub mod retry;

pub use http::HttpStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Read-only access to named blobs.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Fetch the full contents of the object at `path`.
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// Human-readable location of the store, for logs and diagnostics.
    fn describe(&self) -> String;
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where artifacts are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// HTTP object storage: `GET {base_url}/{bucket}/{path}`
    Http {
        /// Base URL of the storage service
        base_url: String,
        /// Bucket name
        bucket: String,
        /// Environment variable holding a bearer token
        #[serde(default)]
        token_env: Option<String>,
        /// Per-request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Directory on the local filesystem
    Local {
        /// Root directory
        root: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Local {
            root: PathBuf::from("artifacts"),
        }
    }
}

impl StoreConfig {
    /// Instantiate the configured backend.
    pub fn build(&self) -> StoreResult<Arc<dyn ObjectStore>> {
        match self {
            Self::Http {
                base_url,
                bucket,
                token_env,
                timeout_secs,
            } => {
                let token = match token_env {
                    Some(var) => Some(std::env::var(var).map_err(|_| {
                        StoreError::Config(format!("environment variable {var} is not set"))
                    })?),
                    None => None,
                };
                let store = HttpStore::new(
                    base_url,
                    bucket,
                    token,
                    Duration::from_secs(*timeout_secs),
                )?;
                Ok(Arc::new(store))
            }
            Self::Local { root } => Ok(Arc::new(LocalStore::new(root))),
        }
    }
}
