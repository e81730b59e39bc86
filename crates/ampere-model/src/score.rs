//! Batch scoring
//!
//! Runs the ensemble over a normalized matrix and returns raw log-odds per row.
//! Probabilities are derived on demand with [`sigmoid`].

use crate::artifact::ModelArtifact;
use crate::error::Result;
use crate::matrix::FeatureMatrix;
use serde::{Deserialize, Serialize};

/// Logistic function mapping log-odds to a probability.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Model output for one input row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Row position in the input batch
    pub row_index: usize,
    /// Raw log-odds
    pub raw_score: f64,
}

impl Prediction {
    /// Probability of the positive class.
    pub fn probability(&self) -> f64 {
        sigmoid(self.raw_score)
    }
}

/// Score every row of a normalized matrix.
///
/// Fails with a schema mismatch (listing expected and actual columns) when the
/// matrix was not built against this artifact's feature order.
pub fn score(matrix: &FeatureMatrix, artifact: &ModelArtifact) -> Result<Vec<Prediction>> {
    matrix.check_schema(artifact.schema())?;

    let input = matrix.to_dense();
    let ensemble = artifact.ensemble();
    Ok(input
        .rows()
        .into_iter()
        .enumerate()
        .map(|(row_index, row)| Prediction {
            row_index,
            raw_score: ensemble.predict_row(&row.to_vec()),
        })
        .collect())
}

/// Mean probability of a batch; 0.0 for an empty batch.
pub fn average_probability(predictions: &[Prediction]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    predictions.iter().map(Prediction::probability).sum::<f64>() / predictions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{Ensemble, EnsembleDocument, Node, Tree};
    use crate::error::ModelError;
    use crate::matrix::FeatureColumn;
    use crate::schema::VocabularyDocument;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn artifact() -> ModelArtifact {
        let ensemble = Ensemble::from_document(EnsembleDocument {
            format_version: 1,
            objective: "binary:logistic".to_string(),
            base_score: 0.0,
            feature_names: vec!["usage".to_string()],
            feature_types: vec!["q".to_string()],
            trees: vec![Tree {
                nodes: vec![
                    Node::Numeric {
                        feature: 0,
                        threshold: 20.0,
                        left: 1,
                        right: 2,
                        default_left: true,
                        cover: 2.0,
                    },
                    Node::Leaf {
                        value: -1.0,
                        cover: 1.0,
                    },
                    Node::Leaf {
                        value: 1.0,
                        cover: 1.0,
                    },
                ],
            }],
        })
        .unwrap();
        ModelArtifact::new("test", ensemble, &VocabularyDocument::default())
    }

    fn usage(values: Vec<f64>) -> FeatureMatrix {
        FeatureMatrix::new(
            values.len(),
            vec![FeatureColumn::Numeric {
                name: "usage".to_string(),
                values,
            }],
        )
        .unwrap()
    }

    #[rstest]
    #[case(0.0, 0.5)]
    #[case(2.0, 0.880_797_077_977_882_3)]
    #[case(-2.0, 0.119_202_922_022_117_6)]
    fn test_sigmoid(#[case] x: f64, #[case] expected: f64) {
        assert_relative_eq!(sigmoid(x), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_score_batch() {
        let predictions = score(&usage(vec![5.0, 25.7]), &artifact()).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].raw_score, -1.0);
        assert_eq!(predictions[1].row_index, 1);
        assert_relative_eq!(predictions[1].probability(), sigmoid(1.0));
        assert_relative_eq!(average_probability(&predictions), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_batch() {
        let predictions = score(&usage(Vec::new()), &artifact()).unwrap();
        assert!(predictions.is_empty());
        assert_eq!(average_probability(&predictions), 0.0);
    }

    #[test]
    fn test_schema_mismatch_lists_columns() {
        let wrong = FeatureMatrix::new(
            1,
            vec![FeatureColumn::Numeric {
                name: "kwh".to_string(),
                values: vec![1.0],
            }],
        )
        .unwrap();

        match score(&wrong, &artifact()) {
            Err(ModelError::FeatureSchemaMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, vec!["usage"]);
                assert_eq!(actual, vec!["kwh"]);
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }
}
