//! Multi-class GBDT classifier with fixed-point trees
//!
//! One boosted tree sequence per class. Raw class scores are accumulated in
//! integers at `scale`; only the final softmax runs in floating point.
//! Serialized as canonical JSON so the blake3 hash is stable.

use super::tree::Tree;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// GBDT model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Feature mismatch: model expects {expected} values, got {found}")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("Non-finite feature value at index {0}")]
    NonFiniteFeature(usize),

    #[error("Invalid probability vector: {0}")]
    InvalidProbabilities(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Fixed-point scale factor (1e6)
pub const SCALE: i64 = 1_000_000;

/// Current serialization format version
pub const FORMAT_VERSION: i32 = 1;

/// Default class labels, index == class id
pub const DEFAULT_CLASSES: [&str; 3] = ["Low", "Medium", "High"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GbdtClassifier {
    pub version: i32,

    /// Fixed-point scale of thresholds, leaves, weights and base scores
    pub scale: i64,

    /// Length of the feature vector the trees index into
    pub feature_count: usize,

    pub classes: Vec<String>,

    /// Initial raw score per class (fixed-point log-odds)
    pub base_scores: Vec<i64>,

    /// Tree sequence per class; `trees[k]` boosts class `k`
    pub trees: Vec<Vec<Tree>>,
}

impl GbdtClassifier {
    /// Create a classifier over [`DEFAULT_CLASSES`]
    pub fn new(feature_count: usize, base_scores: Vec<i64>, trees: Vec<Vec<Tree>>) -> Self {
        Self {
            version: FORMAT_VERSION,
            scale: SCALE,
            feature_count,
            classes: DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect(),
            base_scores,
            trees,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.iter().map(Vec::len).sum()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.scale <= 0 {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid scale: {}",
                self.scale
            )));
        }

        if self.feature_count == 0 {
            return Err(ModelError::ValidationFailed(
                "Model expects zero features".to_string(),
            ));
        }

        let k = self.classes.len();
        if k == 0 || self.base_scores.len() != k || self.trees.len() != k {
            return Err(ModelError::ValidationFailed(format!(
                "Class count mismatch: {} classes, {} base scores, {} tree sequences",
                k,
                self.base_scores.len(),
                self.trees.len()
            )));
        }

        for (class, sequence) in self.trees.iter().enumerate() {
            for (i, tree) in sequence.iter().enumerate() {
                tree.validate(self.feature_count).map_err(|e| {
                    ModelError::ValidationFailed(format!("Class {class} tree {i}: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Convert real-valued features to fixed-point, rejecting NaN/inf.
    pub fn quantize(&self, features: &[f64]) -> Result<Vec<i64>, ModelError> {
        if features.len() != self.feature_count {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_count,
                found: features.len(),
            });
        }

        features
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if v.is_finite() {
                    Ok(to_fixed(*v, self.scale))
                } else {
                    Err(ModelError::NonFiniteFeature(i))
                }
            })
            .collect()
    }

    /// Fixed-point raw score per class.
    ///
    /// Each tree contributes `leaf * weight / scale`.
    pub fn raw_scores(&self, features: &[i64]) -> Vec<i64> {
        self.base_scores
            .iter()
            .zip(&self.trees)
            .map(|(base, sequence)| {
                sequence.iter().fold(*base, |acc, tree| {
                    let leaf = tree.evaluate(features) as i128;
                    let contribution = leaf * tree.weight as i128 / self.scale as i128;
                    acc.saturating_add(contribution.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
                })
            })
            .collect()
    }

    /// Softmax over the raw scores.
    pub fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        let fixed = self.quantize(features)?;
        Ok(softmax(&self.raw_scores(&fixed), self.scale))
    }

    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Blake3 hash of the canonical JSON, hex encoded
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    /// Load and validate a model file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: GbdtClassifier = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }
}

/// Round a real value to fixed-point, saturating at the i64 range.
pub fn to_fixed(value: f64, scale: i64) -> i64 {
    // `as` saturates for out-of-range floats
    (value * scale as f64).round() as i64
}

/// Numerically stable softmax of fixed-point scores.
pub fn softmax(scores: &[i64], scale: i64) -> Vec<f64> {
    let Some(max) = scores.iter().max().copied() else {
        return Vec::new();
    };
    let exps: Vec<f64> = scores
        .iter()
        .map(|s| ((*s as f64 - max as f64) / scale as f64).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
