//! The scoring pipeline
//!
//! Artifact load → normalization → scoring → attribution → selection, one
//! model and one batch per call. The only state shared between calls is the
//! artifact repository, so an [`Engine`] can serve concurrent requests from
//! behind an `Arc`.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::{ModelEntry, ModelRegistry};
use ampere_features::{FeatureFrame, FeatureRecord, NormalizationReport, Normalized, normalize};
use ampere_model::{
    CancellationFlag, FeatureMatrix, ModelArtifact, Prediction, average_probability, score,
    sigmoid,
};
use ampere_output::{
    AttributionError, AttributionGroup, Direction, Explanation, FactorReport, explain,
};
use ampere_store::{ArtifactRepository, BlobCache, CachedStore, ObjectStore, RetryingStore};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-call options for [`Engine::score`].
#[derive(Debug, Clone, Default)]
pub struct ScoreOptions {
    /// Compute SHAP attributions alongside the predictions
    pub explain: bool,
    /// Checked before and during the SHAP pass. The engine never raises it.
    pub cancel: CancellationFlag,
    /// Overrides the configured artifact load timeout for this call
    pub load_timeout: Option<Duration>,
    /// Overrides the configured SHAP timeout for this call
    pub explain_timeout: Option<Duration>,
}

impl ScoreOptions {
    /// Options requesting attributions.
    pub fn explained() -> Self {
        Self {
            explain: true,
            ..Self::default()
        }
    }

    /// Bound the SHAP pass of this call by `timeout`.
    #[must_use]
    pub const fn with_explain_timeout(mut self, timeout: Duration) -> Self {
        self.explain_timeout = Some(timeout);
        self
    }

    /// Bound the artifact load of this call by `timeout`.
    #[must_use]
    pub const fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }
}

/// Predictions for one batch, with attributions when they were requested and
/// could be computed.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringOutcome {
    /// Model that scored the batch
    pub model_name: String,
    /// One prediction per input row, in input order
    pub predictions: Vec<Prediction>,
    /// Mean probability, 0.0 for an empty batch
    pub average_probability: f64,
    /// Number of rows scored
    pub sample_count: usize,
    /// What the normalizer defaulted, synthesized or remapped
    pub normalization: NormalizationReport,
    /// Raw log-odds baseline of the explainer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_value: Option<f64>,
    /// Attribution groups in model feature order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<AttributionGroup>>,
    /// Why attributions were skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shap_warning: Option<String>,
    /// Why the attribution pass failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shap_error: Option<String>,
}

impl ScoringOutcome {
    /// Probability per row.
    pub fn probabilities(&self) -> Vec<f64> {
        self.predictions.iter().map(Prediction::probability).collect()
    }

    /// Probability at the baseline; 0.0 for an empty batch or without explainer.
    pub fn base_probability(&self) -> f64 {
        match self.base_value {
            Some(base) if self.sample_count > 0 => sigmoid(base),
            _ => 0.0,
        }
    }

    /// Ranked factors in one direction, if attributions are present.
    pub fn report(&self, direction: Direction, top_k: Option<usize>) -> Option<FactorReport> {
        let groups = self.groups.as_ref()?;
        Some(
            FactorReport::builder()
                .model_name(&self.model_name)
                .direction(direction)
                .base_probability(self.base_probability())
                .average_probability(self.average_probability)
                .sample_count(self.sample_count)
                .top_k(top_k)
                .build(groups),
        )
    }
}

/// Outcome of scoring one customer against one product.
#[derive(Debug)]
pub struct ProductScore {
    /// Registry entry of the product's model
    pub entry: ModelEntry,
    /// Scoring result
    pub outcome: Result<ScoringOutcome>,
}

/// An eligible product and the customer's propensity for it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProductOffer {
    /// Registry entry of the product's model
    pub entry: ModelEntry,
    /// Predicted probability of purchase
    pub probability: f64,
}

/// Scoring and attribution engine.
#[derive(Debug)]
pub struct Engine {
    repository: ArtifactRepository,
    registry: ModelRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Build the configured store stack: backend, retries, then the blob cache.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let backend = config.store.build()?;
        let mut store: Arc<dyn ObjectStore> =
            Arc::new(RetryingStore::new(backend, config.retry.policy()));
        if config.cache.enabled {
            let cache = Arc::new(BlobCache::new(config.cache.resolved_path())?);
            store = Arc::new(CachedStore::new(store, cache, config.cache.max_age()));
        }
        info!(
            store = %store.describe(),
            cache = config.cache.enabled,
            "engine configured"
        );
        Self::with_store(store, config)
    }

    /// Engine reading artifacts from `store` as is.
    pub fn with_store(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Result<Self> {
        let registry = ModelRegistry::restricted_to(&config.models[..])?;
        Ok(Self {
            repository: ArtifactRepository::new(store),
            registry,
            config,
        })
    }

    /// Models this engine serves.
    pub const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Shared artifact repository.
    pub const fn repository(&self) -> &ArtifactRepository {
        &self.repository
    }

    /// Active configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a registered model within the configured load timeout.
    pub async fn artifact(&self, model_name: &str) -> Result<Arc<ModelArtifact>> {
        self.artifact_within(model_name, self.config.load_timeout())
            .await
    }

    async fn artifact_within(
        &self,
        model_name: &str,
        timeout: Duration,
    ) -> Result<Arc<ModelArtifact>> {
        self.registry.get(model_name)?;
        Ok(self
            .repository
            .load_with_timeout(model_name, timeout)
            .await?)
    }

    /// Normalize a batch onto a model's feature order without scoring it.
    pub async fn normalize(&self, model_name: &str, frame: &FeatureFrame) -> Result<Normalized> {
        let artifact = self.artifact(model_name).await?;
        Ok(normalize(frame, &artifact)?)
    }

    /// Score a batch, optionally with attributions.
    ///
    /// A missing explainer or a failed attribution pass does not fail the
    /// call; it is reported in `shap_warning` / `shap_error`. An attribution
    /// timeout or cancellation does, for this call only.
    pub async fn score(
        &self,
        model_name: &str,
        frame: &FeatureFrame,
        options: &ScoreOptions,
    ) -> Result<ScoringOutcome> {
        let load_timeout = options
            .load_timeout
            .unwrap_or_else(|| self.config.load_timeout());
        let artifact = self.artifact_within(model_name, load_timeout).await?;
        let Normalized { matrix, report } = normalize(frame, &artifact)?;
        let predictions = score(&matrix, &artifact)?;

        let mut outcome = ScoringOutcome {
            model_name: model_name.to_string(),
            average_probability: average_probability(&predictions),
            sample_count: predictions.len(),
            predictions,
            normalization: report,
            base_value: artifact.base_value(),
            groups: None,
            shap_warning: None,
            shap_error: None,
        };

        if options.explain {
            let timeout = options
                .explain_timeout
                .unwrap_or_else(|| self.config.explain_timeout());
            match self
                .explain_matrix(&artifact, matrix, &options.cancel, timeout)
                .await
            {
                Ok(explanation) => {
                    outcome.base_value = Some(explanation.base_value);
                    outcome.groups = Some(explanation.groups);
                }
                Err(EngineError::Attribution(AttributionError::Unavailable(reason))) => {
                    warn!(model = model_name, %reason, "SHAP explainer unavailable, returning predictions only");
                    outcome.shap_warning = Some(format!("SHAP explainer unavailable: {reason}"));
                }
                Err(EngineError::Attribution(err)) => {
                    warn!(model = model_name, error = %err, "SHAP computation failed, returning predictions only");
                    outcome.shap_error = Some(err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            model = model_name,
            rows = outcome.sample_count,
            average_probability = outcome.average_probability,
            explained = outcome.groups.is_some(),
            "scored batch"
        );
        Ok(outcome)
    }

    /// Score a batch and rank the factors pushing it in `direction`.
    ///
    /// Unlike [`Engine::score`], attributions are the product here, so an
    /// unavailable explainer is an error. No matching factor is not.
    pub async fn analyze(
        &self,
        model_name: &str,
        frame: &FeatureFrame,
        direction: Direction,
        top_k: Option<usize>,
    ) -> Result<FactorReport> {
        let outcome = self
            .score(model_name, frame, &ScoreOptions::explained())
            .await?;
        let top_k = top_k.unwrap_or(self.config.top_k);
        outcome.report(direction, Some(top_k)).ok_or_else(|| {
            let reason = outcome
                .shap_warning
                .or(outcome.shap_error)
                .unwrap_or_else(|| "no attributions".to_string());
            AttributionError::Unavailable(reason).into()
        })
    }

    /// Score one batch against several products concurrently.
    ///
    /// Products are given by display name or model name; an unknown product
    /// fails the whole call before any model is loaded.
    pub async fn score_products<S: AsRef<str>>(
        &self,
        frame: &FeatureFrame,
        products: &[S],
        options: &ScoreOptions,
    ) -> Result<Vec<ProductScore>> {
        let entries = products
            .iter()
            .map(|product| self.registry.for_product(product.as_ref()).copied())
            .collect::<Result<Vec<_>>>()?;

        let outcomes = join_all(
            entries
                .iter()
                .map(|entry| self.score(entry.name, frame, options)),
        )
        .await;

        Ok(entries
            .into_iter()
            .zip(outcomes)
            .map(|(entry, outcome)| ProductScore { entry, outcome })
            .collect())
    }

    /// Score every product the customer does not hold yet, most likely first.
    ///
    /// Products whose model fails to score are logged and left out.
    pub async fn rank_eligible_products(&self, record: &FeatureRecord) -> Result<Vec<ProductOffer>> {
        let products: Vec<&str> = self
            .registry
            .eligible_products(record)
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        let frame = FeatureFrame::from_record(record);
        let scores = self
            .score_products(&frame, &products[..], &ScoreOptions::default())
            .await?;

        let mut offers: Vec<ProductOffer> = scores
            .into_iter()
            .filter_map(|score| match score.outcome {
                Ok(outcome) => Some(ProductOffer {
                    entry: score.entry,
                    probability: outcome.average_probability,
                }),
                Err(err) => {
                    warn!(model = score.entry.name, error = %err, "product scoring failed, skipping");
                    None
                }
            })
            .collect();
        offers.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        Ok(offers)
    }

    async fn explain_matrix(
        &self,
        artifact: &Arc<ModelArtifact>,
        matrix: FeatureMatrix,
        cancel: &CancellationFlag,
        timeout: Duration,
    ) -> Result<Explanation> {
        artifact
            .explainer()
            .map_err(|reason| AttributionError::Unavailable(reason.to_string()))?;

        let model = artifact.model_name().to_string();
        // Raised on timeout; the caller's flag stays as the caller left it.
        let call_cancel = cancel.child();
        let task = {
            let artifact = Arc::clone(artifact);
            let cancel = call_cancel.clone();
            tokio::task::spawn_blocking(move || explain(&matrix, &artifact, &cancel))
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined?.map_err(|err| {
                if err.is_cancelled() {
                    EngineError::Cancelled { model }
                } else {
                    err.into()
                }
            }),
            Err(_) => {
                call_cancel.cancel();
                warn!(model = %model, ?timeout, "SHAP computation timed out");
                Err(EngineError::ExplainTimeout { model, timeout })
            }
        }
    }
}
