//! Shared fixtures: a memory store seeded with a small HVAC model.

#![allow(dead_code, unreachable_pub)]

use ampere::{Engine, EngineConfig, FeatureFrame, FeatureRecord};
use ampere_store::MemoryStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const VOCABULARY: &str = r#"{
    "city": ["calgary", "edmonton", "medicine_hat", "unknown"],
    "heating_type": ["electric", "gas", "unknown"]
}"#;

// Expected value: -0.04 (city) + 0.05 (usage) + 0.06 (heating) = 0.07.
pub const HVAC_ENSEMBLE: &str = r#"{
    "format_version": 1,
    "objective": "binary:logistic",
    "base_score": 0.0,
    "feature_names": ["city", "heating_type", "monthly_usage_kwh", "tenure_months"],
    "feature_types": ["c", "c", "q", "q"],
    "trees": [
        {"nodes": [
            {"kind": "categorical", "feature": 0, "categories": [2], "left": 1, "right": 2, "cover": 10.0},
            {"kind": "leaf", "value": -0.2, "cover": 8.0},
            {"kind": "leaf", "value": 0.6, "cover": 2.0}
        ]},
        {"nodes": [
            {"kind": "numeric", "feature": 2, "threshold": 20.0, "left": 1, "right": 2, "cover": 10.0},
            {"kind": "leaf", "value": -0.3, "cover": 5.0},
            {"kind": "leaf", "value": 0.4, "cover": 5.0}
        ]},
        {"nodes": [
            {"kind": "categorical", "feature": 1, "categories": [1], "left": 1, "right": 2, "cover": 10.0},
            {"kind": "leaf", "value": -0.1, "cover": 6.0},
            {"kind": "leaf", "value": 0.3, "cover": 4.0}
        ]}
    ]
}"#;

pub const BASE_VALUE: f64 = 0.07;

pub fn explainer(model: &str) -> String {
    format!(
        r#"{{"model_name": "{model}", "algorithm": "tree_path_dependent", "base_value": {BASE_VALUE},
            "num_trees": 3,
            "feature_names": ["city", "heating_type", "monthly_usage_kwh", "tenure_months"]}}"#
    )
}

/// Store with `crosssell_hvac` (ensemble and explainer) and `churn` (ensemble only).
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert("categories/train_categories.json", VOCABULARY.as_bytes().to_vec());
    store.insert("models/crosssell_hvac_model.json", HVAC_ENSEMBLE.as_bytes().to_vec());
    store.insert(
        "shap_explainer/crosssell_hvac_shap_explainer.json",
        explainer("crosssell_hvac").into_bytes(),
    );
    store.insert("models/churn_model.json", HVAC_ENSEMBLE.as_bytes().to_vec());
    store
}

/// Full binary trees over usage and tenure; explaining a large batch takes
/// far longer than a few milliseconds.
pub fn heavy_ensemble(trees: usize, depth: u32) -> Value {
    let n_nodes = (1_usize << (depth + 1)) - 1;
    let tree = |offset: usize| {
        let nodes: Vec<Value> = (0..n_nodes)
            .map(|i| {
                let level = usize::BITS - 1 - (i + 1).leading_zeros();
                if level == depth {
                    let value = if i % 2 == 0 { 0.01 } else { -0.01 };
                    json!({"kind": "leaf", "value": value, "cover": 1.0})
                } else {
                    json!({
                        "kind": "numeric",
                        "feature": 2 + (level % 2),
                        "threshold": ((i + offset) % 60) as f64,
                        "left": 2 * i + 1,
                        "right": 2 * i + 2,
                        "cover": f64::from(1_u32 << (depth - level)),
                    })
                }
            })
            .collect();
        json!({"nodes": nodes})
    };

    json!({
        "format_version": 1,
        "objective": "binary:logistic",
        "base_score": 0.0,
        "feature_names": ["city", "heating_type", "monthly_usage_kwh", "tenure_months"],
        "feature_types": ["c", "c", "q", "q"],
        "trees": (0..trees).map(tree).collect::<Vec<_>>(),
    })
}

/// Store whose `crosssell_hvac` model is [`heavy_ensemble`].
pub fn heavy_store(trees: usize, depth: u32) -> MemoryStore {
    let explainer = json!({
        "model_name": "crosssell_hvac",
        "algorithm": "tree_path_dependent",
        "base_value": 0.0,
        "num_trees": trees,
        "feature_names": ["city", "heating_type", "monthly_usage_kwh", "tenure_months"],
    });
    let store = MemoryStore::new();
    store.insert("categories/train_categories.json", VOCABULARY.as_bytes().to_vec());
    store.insert(
        "models/crosssell_hvac_model.json",
        heavy_ensemble(trees, depth).to_string().into_bytes(),
    );
    store.insert(
        "shap_explainer/crosssell_hvac_shap_explainer.json",
        explainer.to_string().into_bytes(),
    );
    store
}

pub fn heavy_batch(rows: usize) -> FeatureFrame {
    let records: Vec<FeatureRecord> = (0..rows)
        .map(|i| {
            FeatureRecord::new()
                .with("city", "calgary")
                .with("monthly_usage_kwh", (i % 97) as f64)
                .with("tenure_months", (i % 61) as f64)
        })
        .collect();
    FeatureFrame::from_records(&records)
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.cache.enabled = false;
    config
}

pub fn engine() -> Engine {
    engine_with(seeded_store(), test_config())
}

pub fn engine_with(store: MemoryStore, config: EngineConfig) -> Engine {
    Engine::with_store(Arc::new(store), config).unwrap()
}

pub fn slow_engine(latency: Duration, load_timeout_secs: u64) -> Engine {
    let mut config = test_config();
    config.load_timeout_secs = load_timeout_secs;
    engine_with(seeded_store().with_latency(latency), config)
}

pub fn frame(record: FeatureRecord) -> FeatureFrame {
    FeatureFrame::from_record(&record)
}

pub fn scenario_record() -> FeatureRecord {
    FeatureRecord::new()
        .with("monthly_usage_kwh", 25.7)
        .with("city", "medicine_hat")
}
