//! Prediction contract shared by every crowd-level model.
//!
//! A predictor maps a schema-aligned feature vector to a probability simplex
//! over [`CrowdLevel`] and the arg-max class.

use crate::errors::Result;
use crate::gbdt::{GbdtClassifier, ModelError};
use crate::records::CrowdLevel;
use serde::{Deserialize, Serialize};

/// Tolerance for a probability vector to count as normalised.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Anything that can classify an encoded feature vector.
pub trait CrowdPredictor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<Prediction>;

    /// Length of the feature vector `predict` expects.
    fn feature_count(&self) -> usize;

    fn model_type(&self) -> &str;
}

/// Probability per crowd level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Medium")]
    pub medium: f64,
    #[serde(rename = "High")]
    pub high: f64,
}

impl ClassProbabilities {
    /// Renormalise three non-negative weights onto the simplex.
    pub fn normalized(weights: [f64; 3]) -> std::result::Result<Self, ModelError> {
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ModelError::InvalidProbabilities(format!("{weights:?}")));
        }
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return Err(ModelError::InvalidProbabilities(format!(
                "{weights:?} sums to zero"
            )));
        }
        Ok(Self {
            low: weights[0] / sum,
            medium: weights[1] / sum,
            high: weights[2] / sum,
        })
    }

    pub fn get(&self, level: CrowdLevel) -> f64 {
        self.as_array()[level.index()]
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.low, self.medium, self.high]
    }

    /// Most probable level; the lowest level wins ties.
    pub fn argmax(&self) -> CrowdLevel {
        let mut best = CrowdLevel::Low;
        for level in CrowdLevel::ALL {
            if self.get(level) > self.get(best) {
                best = level;
            }
        }
        best
    }
}

/// Classifier output for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub level: CrowdLevel,
    pub probabilities: ClassProbabilities,
    /// Probability of `level`.
    pub confidence: f64,
}

impl Prediction {
    pub fn from_weights(weights: [f64; 3]) -> std::result::Result<Self, ModelError> {
        let probabilities = ClassProbabilities::normalized(weights)?;
        let level = probabilities.argmax();
        Ok(Self {
            level,
            probabilities,
            confidence: probabilities.get(level),
        })
    }
}

impl CrowdPredictor for GbdtClassifier {
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        let probs = self.predict_proba(features)?;
        let weights: [f64; 3] = probs.as_slice().try_into().map_err(|_| {
            ModelError::InvalidProbabilities(format!("expected 3 classes, got {}", probs.len()))
        })?;
        Ok(Prediction::from_weights(weights)?)
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn model_type(&self) -> &str {
        "GbdtClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreError;
    use crate::gbdt::{Node, Tree, SCALE};

    #[test]
    fn test_renormalises() {
        let p = ClassProbabilities::normalized([1.0, 1.0, 2.0]).unwrap();
        assert_eq!(p.as_array(), [0.25, 0.25, 0.5]);
        assert_eq!(p.argmax(), CrowdLevel::High);
    }

    #[test]
    fn test_ties_go_to_lowest_level() {
        let p = ClassProbabilities::normalized([1.0, 1.0, 1.0]).unwrap();
        assert_eq!(p.argmax(), CrowdLevel::Low);

        let p = ClassProbabilities::normalized([0.0, 2.0, 2.0]).unwrap();
        assert_eq!(p.argmax(), CrowdLevel::Medium);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(ClassProbabilities::normalized([0.0, 0.0, 0.0]).is_err());
        assert!(ClassProbabilities::normalized([f64::NAN, 1.0, 1.0]).is_err());
        assert!(ClassProbabilities::normalized([-0.5, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_prediction_confidence_is_max() {
        let prediction = Prediction::from_weights([0.2, 0.5, 0.3]).unwrap();
        assert_eq!(prediction.level, CrowdLevel::Medium);
        assert!((prediction.confidence - 0.5).abs() < PROBABILITY_TOLERANCE);
    }

    #[test]
    fn test_probabilities_serialize_with_level_names() {
        let p = ClassProbabilities::normalized([1.0, 0.0, 0.0]).unwrap();
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(json["Low"], 1.0);
        assert_eq!(json["High"], 0.0);
    }

    #[test]
    fn test_gbdt_predictor() {
        let stump = |left, right| {
            vec![Tree::new(
                vec![
                    Node::internal(0, 0, 10 * SCALE, 1, 2),
                    Node::leaf(1, left),
                    Node::leaf(2, right),
                ],
                SCALE,
            )]
        };
        let model = GbdtClassifier::new(
            1,
            vec![0, 0, 0],
            vec![stump(SCALE, -SCALE), stump(0, 0), stump(-SCALE, SCALE)],
        );

        let predictor: &dyn CrowdPredictor = &model;
        assert_eq!(predictor.feature_count(), 1);
        assert_eq!(predictor.predict(&[5.0]).unwrap().level, CrowdLevel::Low);
        assert_eq!(predictor.predict(&[50.0]).unwrap().level, CrowdLevel::High);
        assert!(matches!(
            predictor.predict(&[]),
            Err(CoreError::Model(ModelError::FeatureMismatch { .. }))
        ));
    }
}
