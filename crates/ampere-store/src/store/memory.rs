//! In-process object store.

use super::ObjectStore;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, Arc<[u8]>>,
    pending_failures: HashMap<String, usize>,
    denied: HashSet<String>,
    fetches: HashMap<String, usize>,
}

/// Blobs held in memory, with knobs for simulating a slow or flaky store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    latency: Duration,
    total_fetches: AtomicUsize,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `get` by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object, replacing any previous one.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.state().objects.insert(path.into(), Arc::from(bytes));
    }

    /// Remove an object.
    pub fn remove(&self, path: &str) -> bool {
        self.state().objects.remove(path).is_some()
    }

    /// Make the next `times` reads of `path` fail with a transient error.
    pub fn fail_transiently(&self, path: impl Into<String>, times: usize) {
        self.state().pending_failures.insert(path.into(), times);
    }

    /// Make every read of `path` fail with permission denied.
    pub fn deny(&self, path: impl Into<String>) {
        self.state().denied.insert(path.into());
    }

    /// Total number of `get` calls served, including failed ones.
    pub fn fetch_count(&self) -> usize {
        self.total_fetches.load(Ordering::SeqCst)
    }

    /// Number of `get` calls for one path.
    pub fn fetches_of(&self, path: &str) -> usize {
        self.state().fetches.get(path).copied().unwrap_or(0)
    }

    /// Paths of all stored objects, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state().objects.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.total_fetches.fetch_add(1, Ordering::SeqCst);
        *self.state().fetches.entry(path.to_string()).or_insert(0) += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state();
        if state.denied.contains(path) {
            return Err(StoreError::PermissionDenied {
                path: path.to_string(),
                reason: "access denied".to_string(),
            });
        }
        if let Some(remaining) = state.pending_failures.get_mut(path)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StoreError::Transient {
                path: path.to_string(),
                reason: "simulated outage".to_string(),
            });
        }
        state
            .objects
            .get(path)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
