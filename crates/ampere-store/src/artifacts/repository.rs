//! Single-flight artifact repository
//!
//! Each model is fetched and deserialized at most once per repository. The
//! first caller for a model runs the load; concurrent callers for the same
//! model wait on the same per-model cell instead of issuing their own fetches.
//! A failed or abandoned load leaves the cell empty, so the next caller retries.

use super::layout::ArtifactLayout;
use crate::error::{ArtifactError, Result};
use crate::store::ObjectStore;
use ampere_model::{Ensemble, ExplainerDocument, ModelArtifact, VocabularyDocument};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{info, warn};

type Slot = Arc<OnceCell<Arc<ModelArtifact>>>;

/// Loads and memoizes model artifacts from an object store.
pub struct ArtifactRepository {
    store: Arc<dyn ObjectStore>,
    layout: ArtifactLayout,
    vocabulary: OnceCell<Arc<VocabularyDocument>>,
    slots: Mutex<HashMap<String, Slot>>,
    fetches: AtomicUsize,
}

impl fmt::Debug for ArtifactRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRepository")
            .field("store", &self.store.describe())
            .field("layout", &self.layout)
            .field("cached_models", &self.cached_models())
            .finish()
    }
}

impl ArtifactRepository {
    /// Repository over `store` using the default path layout.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_layout(store, ArtifactLayout::default())
    }

    /// Repository over `store` with a custom path layout.
    pub fn with_layout(store: Arc<dyn ObjectStore>, layout: ArtifactLayout) -> Self {
        Self {
            store,
            layout,
            vocabulary: OnceCell::new(),
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Path layout in use.
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, model_name: &str) -> Slot {
        Arc::clone(self.slots().entry(model_name.to_string()).or_default())
    }

    /// Load a model, fetching it only if no load has completed yet.
    pub async fn load(&self, model_name: &str) -> Result<Arc<ModelArtifact>> {
        let slot = self.slot(model_name);
        slot.get_or_try_init(|| self.fetch_artifact(model_name))
            .await
            .map(Arc::clone)
    }

    /// Load a model, failing with [`ArtifactError::LoadTimeout`] after `timeout`.
    ///
    /// An abandoned load does not poison the cache: the next caller starts over.
    pub async fn load_with_timeout(
        &self,
        model_name: &str,
        timeout: Duration,
    ) -> Result<Arc<ModelArtifact>> {
        tokio::time::timeout(timeout, self.load(model_name))
            .await
            .map_err(|_| ArtifactError::LoadTimeout {
                model: model_name.to_string(),
                timeout,
            })?
    }

    /// Load several models concurrently; results follow the order of `model_names`.
    pub async fn prefetch<S: AsRef<str>>(
        &self,
        model_names: &[S],
    ) -> Vec<Result<Arc<ModelArtifact>>> {
        join_all(model_names.iter().map(|name| self.load(name.as_ref()))).await
    }

    /// Names of models whose load has completed, sorted.
    pub fn cached_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Whether a model is loaded.
    pub fn is_cached(&self, model_name: &str) -> bool {
        self.slots()
            .get(model_name)
            .is_some_and(|slot| slot.initialized())
    }

    /// Drop a loaded model so the next `load` fetches it again.
    ///
    /// Callers holding the evicted artifact keep using their copy. A load still
    /// in flight is left alone so later callers keep joining it.
    pub fn evict(&self, model_name: &str) -> bool {
        let removed = {
            let mut slots = self.slots();
            let loaded = slots
                .get(model_name)
                .is_some_and(|slot| slot.initialized());
            if loaded {
                slots.remove(model_name);
            }
            loaded
        };
        if removed {
            info!(model = model_name, "evicted model artifact");
        }
        removed
    }

    /// Number of blob fetches issued to the store so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Shared vocabulary, loaded on first use.
    pub async fn vocabulary(&self) -> Result<Arc<VocabularyDocument>> {
        self.vocabulary
            .get_or_try_init(|| async {
                let path = self.layout.vocabulary_path();
                let bytes = self.fetch(path).await?;
                let document: VocabularyDocument = serde_json::from_slice(&bytes)
                    .map_err(|e| ArtifactError::corrupt(path, e))?;
                info!(path, features = document.len(), "loaded category vocabulary");
                Ok::<_, ArtifactError>(Arc::new(document))
            })
            .await
            .map(Arc::clone)
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.store
            .get(path)
            .await
            .map_err(|e| ArtifactError::from_store(path, e))
    }

    async fn fetch_artifact(&self, model_name: &str) -> Result<Arc<ModelArtifact>> {
        let started = Instant::now();
        let vocabulary = self.vocabulary().await?;

        let ensemble_path = self.layout.ensemble_path(model_name);
        let bytes = self.fetch(&ensemble_path).await?;
        let ensemble =
            Ensemble::from_slice(&bytes).map_err(|e| ArtifactError::corrupt(&ensemble_path, e))?;

        let artifact = ModelArtifact::new(model_name, ensemble, &vocabulary);
        let artifact = self.attach_explainer(model_name, artifact).await?;

        info!(
            model = model_name,
            trees = artifact.ensemble().trees().len(),
            features = artifact.schema().len(),
            explainer = artifact.explainer().is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            store = %self.store.describe(),
            "loaded model artifact"
        );
        Ok(Arc::new(artifact))
    }

    async fn attach_explainer(
        &self,
        model_name: &str,
        artifact: ModelArtifact,
    ) -> Result<ModelArtifact> {
        let path = self.layout.explainer_path(model_name);
        let bytes = match self.fetch(&path).await {
            Ok(bytes) => bytes,
            Err(ArtifactError::NotFound { .. }) => {
                warn!(model = model_name, %path, "explainer not found");
                return Ok(artifact.without_explainer(format!("explainer not found at {path}")));
            }
            Err(e) => return Err(e),
        };
        match serde_json::from_slice::<ExplainerDocument>(&bytes) {
            Ok(document) => Ok(artifact.with_explainer(&document)),
            Err(e) => {
                warn!(model = model_name, %path, error = %e, "explainer document corrupt");
                Ok(artifact.without_explainer(format!("explainer corrupt at {path}: {e}")))
            }
        }
    }
}
