//! Local directory store.

use super::ObjectStore;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Objects stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StoreError::PermissionDenied {
                path: path.to_string(),
                reason: "path escapes the store root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        let file = self.resolve(path)?;
        tokio::fs::read(&file).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                path: path.to_string(),
            },
            ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path: path.to_string(),
                reason: e.to_string(),
            },
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                StoreError::Transient {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
            _ => StoreError::Io(e),
        })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
