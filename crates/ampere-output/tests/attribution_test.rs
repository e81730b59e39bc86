//! End-to-end attribution, selection and reporting over a small ensemble.

use ampere_model::{
    CancellationFlag, Ensemble, ExplainerDocument, FeatureColumn, FeatureMatrix, ModelArtifact,
    VocabularyDocument,
};
use ampere_output::{
    AttributionError, Direction, Explanation, FactorReport, explain, select,
};
use approx::assert_relative_eq;
use rstest::{fixture, rstest};
use std::collections::HashMap;

// city: medicine_hat (code 2) routes right. usage: < 20 routes left. tenure never splits.
const ENSEMBLE: &str = r#"{
    "format_version": 1,
    "objective": "binary:logistic",
    "base_score": 0.0,
    "feature_names": ["city", "usage", "tenure"],
    "feature_types": ["c", "q", "q"],
    "trees": [
        {"nodes": [
            {"kind": "categorical", "feature": 0, "categories": [2], "left": 1, "right": 2, "cover": 10.0},
            {"kind": "leaf", "value": -0.2, "cover": 8.0},
            {"kind": "leaf", "value": 0.6, "cover": 2.0}
        ]},
        {"nodes": [
            {"kind": "numeric", "feature": 1, "threshold": 20.0, "left": 1, "right": 2, "cover": 10.0},
            {"kind": "leaf", "value": -0.3, "cover": 5.0},
            {"kind": "leaf", "value": 0.4, "cover": 5.0}
        ]}
    ]
}"#;

const CITIES: [&str; 4] = ["calgary", "edmonton", "medicine_hat", "unknown"];

fn explainer_document(base_value: f64) -> ExplainerDocument {
    ExplainerDocument {
        model_name: "crosssell_hvac".to_string(),
        algorithm: "tree_path_dependent".to_string(),
        base_value,
        num_trees: 2,
        feature_names: vec!["city".into(), "usage".into(), "tenure".into()],
    }
}

#[fixture]
fn artifact() -> ModelArtifact {
    let ensemble = Ensemble::from_slice(ENSEMBLE.as_bytes()).unwrap();
    let vocab = HashMap::from([(
        "city".to_string(),
        CITIES.iter().map(|c| c.to_string()).collect(),
    )]);
    ModelArtifact::new("crosssell_hvac", ensemble, &VocabularyDocument(vocab))
        .with_explainer(&explainer_document(0.01))
}

fn batch(rows: &[(&str, f64, f64)]) -> FeatureMatrix {
    let code = |city: &str| CITIES.iter().position(|c| *c == city).map(|i| i as u32);
    FeatureMatrix::new(
        rows.len(),
        vec![
            FeatureColumn::Categorical {
                name: "city".to_string(),
                labels: rows.iter().map(|r| r.0.to_string()).collect(),
                codes: rows.iter().map(|r| code(r.0)).collect(),
            },
            FeatureColumn::Numeric {
                name: "usage".to_string(),
                values: rows.iter().map(|r| r.1).collect(),
            },
            FeatureColumn::Numeric {
                name: "tenure".to_string(),
                values: rows.iter().map(|r| r.2).collect(),
            },
        ],
    )
    .unwrap()
}

#[fixture]
fn mixed() -> FeatureMatrix {
    batch(&[
        ("medicine_hat", 25.7, 12.0),
        ("calgary", 25.7, 3.0),
        ("medicine_hat", 10.0, 40.0),
        ("edmonton", 30.0, 7.0),
    ])
}

fn run(matrix: &FeatureMatrix, artifact: &ModelArtifact) -> Explanation {
    explain(matrix, artifact, &CancellationFlag::new()).unwrap()
}

#[rstest]
fn test_single_split_attributions(artifact: ModelArtifact, mixed: FeatureMatrix) {
    let explanation = run(&mixed, &artifact);
    assert_relative_eq!(explanation.base_value, 0.01);

    let city: Vec<_> = explanation.groups_of("city").collect();
    let labels: Vec<_> = city.iter().map(|g| g.group_label.as_str()).collect();
    assert_eq!(labels, vec!["calgary", "edmonton", "medicine_hat"]);
    assert_relative_eq!(city[0].mean_shap, -0.16, epsilon = 1e-9);
    assert_relative_eq!(city[2].mean_shap, 0.64, epsilon = 1e-9);
    assert_eq!(city[2].row_count, 2);

    assert_eq!(explanation.importances[0].rank, 1);
    assert_relative_eq!(explanation.importances[0].importance, 0.4, epsilon = 1e-9);
    assert_relative_eq!(explanation.importances[1].importance, 0.35, epsilon = 1e-9);
}

#[rstest]
fn test_ranks_are_a_permutation(artifact: ModelArtifact, mixed: FeatureMatrix) {
    let explanation = run(&mixed, &artifact);
    let mut ranks: Vec<_> = explanation.importances.iter().map(|i| i.rank).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![1, 2, 3]);

    for group in &explanation.groups {
        let importance = explanation
            .importances
            .iter()
            .find(|i| i.feature == group.feature)
            .unwrap();
        assert_eq!(group.importance_rank, importance.rank);
    }
}

#[rstest]
fn test_every_row_is_covered_once_per_feature(artifact: ModelArtifact, mixed: FeatureMatrix) {
    let explanation = run(&mixed, &artifact);
    for feature in ["city", "usage", "tenure"] {
        let rows: usize = explanation.groups_of(feature).map(|g| g.row_count).sum();
        assert_eq!(rows, mixed.n_rows(), "{feature}");
    }

    let positive = select(&explanation.groups, Direction::Positive);
    let negative = select(&explanation.groups, Direction::Negative);
    let zero = explanation.groups.iter().filter(|g| g.mean_shap == 0.0).count();
    assert_eq!(positive.len() + negative.len() + zero, explanation.groups.len());
}

#[rstest]
fn test_unused_feature_has_zero_delta(artifact: ModelArtifact, mixed: FeatureMatrix) {
    let explanation = run(&mixed, &artifact);
    let tenure: Vec<_> = explanation.groups_of("tenure").collect();
    assert!(!tenure.is_empty());
    for group in tenure {
        assert_eq!(group.mean_shap, 0.0);
        assert_eq!(group.probability_delta_pct, 0.0);
    }
    assert_eq!(explanation.importances[2].rank, 3);
}

#[rstest]
fn test_all_positive_batch_has_no_negative_factors(artifact: ModelArtifact) {
    let matrix = batch(&[("medicine_hat", 25.7, 5.0)]);
    let explanation = run(&matrix, &artifact);

    let report = FactorReport::builder()
        .model_name("crosssell_hvac")
        .direction(Direction::Negative)
        .sample_count(1)
        .build(&explanation.groups);
    assert!(report.is_empty());

    let positive = select(&explanation.groups, Direction::Positive);
    let features: Vec<_> = positive.iter().map(|g| g.feature.as_str()).collect();
    assert_eq!(features, vec!["city", "usage"]);
    assert!(positive.iter().all(|g| g.probability_delta_pct > 0.0));
}

#[rstest]
fn test_explanations_are_deterministic(artifact: ModelArtifact, mixed: FeatureMatrix) {
    let first = run(&mixed, &artifact);
    let second = run(&mixed, &artifact);
    assert_eq!(first, second);

    let report = |e: &Explanation| {
        FactorReport::builder()
            .model_name("crosssell_hvac")
            .top_k(Some(2))
            .build(&e.groups)
            .factors
    };
    assert_eq!(report(&first), report(&second));
}

#[rstest]
fn test_missing_explainer_is_unavailable(mixed: FeatureMatrix) {
    let ensemble = Ensemble::from_slice(ENSEMBLE.as_bytes()).unwrap();
    let artifact =
        ModelArtifact::new("crosssell_hvac", ensemble, &VocabularyDocument(HashMap::new()))
            .without_explainer("explainer not found");
    let err = explain(&mixed, &artifact, &CancellationFlag::new()).unwrap_err();
    assert!(matches!(err, AttributionError::Unavailable(reason) if reason.contains("not found")));
}

#[rstest]
fn test_cancelled_explanation(artifact: ModelArtifact, mixed: FeatureMatrix) {
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let err = explain(&mixed, &artifact, &cancel).unwrap_err();
    assert!(err.is_cancelled());
}
