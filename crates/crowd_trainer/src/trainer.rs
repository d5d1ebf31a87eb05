//! Multi-class GBDT trainer
//!
//! Softmax cross-entropy boosting: each round fits one CART tree per class
//! to that class's fixed-point gradients and hessians, then advances every
//! row's raw scores with exactly the arithmetic used at inference.

use crowdcast_core::gbdt::{softmax, to_fixed, GbdtClassifier, Tree, SCALE};
use crowdcast_core::CrowdLevel;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cart::{CartBuilder, TreeConfig};
use crate::dataset::Dataset;
use crate::errors::TrainerError;

const NUM_CLASSES: usize = CrowdLevel::ALL.len();

/// Smallest hessian per row, keeps leaf values bounded for confident rows
const MIN_HESSIAN: i64 = SCALE / 1000;

/// Boosting hyper-parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Boosting rounds; each round adds one tree per class
    pub rounds: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
    /// L2 regularisation on leaf values
    pub lambda: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            rounds: 300,
            max_depth: 8,
            min_samples_leaf: 20,
            learning_rate: 0.05,
            lambda: 1.0,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.rounds == 0 {
            return Err(TrainerError::Config("rounds must be positive".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(TrainerError::Config(format!(
                "learning rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(self.lambda >= 0.0 && self.lambda.is_finite()) {
            return Err(TrainerError::Config(format!(
                "lambda must be finite and non-negative, got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

/// Trainer output: the classifier and raw gain per feature
#[derive(Clone, Debug)]
pub struct TrainedModel {
    pub classifier: GbdtClassifier,
    /// Summed split gain per feature index, in real units
    pub feature_gains: Vec<f64>,
}

pub struct GbdtTrainer {
    params: TrainingParams,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    pub fn train(&self, dataset: &Dataset) -> Result<TrainedModel, TrainerError> {
        self.params.validate()?;
        if dataset.is_empty() {
            return Err(TrainerError::Training("training set is empty".into()));
        }
        if dataset.feature_count == 0 {
            return Err(TrainerError::Training("training set has no features".into()));
        }

        let n = dataset.len();
        let base_scores = Self::base_scores(&dataset.class_counts(), n);
        let mut raw: Vec<[i64; NUM_CLASSES]> = vec![base_scores; n];

        let tree_config = TreeConfig {
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
            lambda: to_fixed(self.params.lambda, SCALE),
        };
        let weight = to_fixed(self.params.learning_rate, SCALE);

        let mut trees: Vec<Vec<Tree>> = vec![Vec::with_capacity(self.params.rounds); NUM_CLASSES];
        let mut feature_gains = vec![0f64; dataset.feature_count];

        for round in 0..self.params.rounds {
            let probs: Vec<Vec<f64>> = raw.iter().map(|s| softmax(s, SCALE)).collect();

            for class in 0..NUM_CLASSES {
                let (gradients, hessians) =
                    Self::gradients_hessians(&probs, &dataset.labels, class);

                let built =
                    CartBuilder::new(&dataset.features, &gradients, &hessians, tree_config.clone())
                        .build();
                let mut tree = built.tree;
                tree.weight = weight;

                for (feature, gain) in built.split_gains {
                    feature_gains[feature] += gain as f64 / SCALE as f64;
                }
                for (row, scores) in dataset.features.iter().zip(raw.iter_mut()) {
                    scores[class] = scores[class].saturating_add(Self::contribution(&tree, row));
                }
                trees[class].push(tree);
            }

            if (round + 1) % 50 == 0 || round + 1 == self.params.rounds {
                info!(
                    "Round {}/{}: training log-loss {:.5}",
                    round + 1,
                    self.params.rounds,
                    log_loss(&raw, &dataset.labels)
                );
            } else {
                debug!("Round {}/{} complete", round + 1, self.params.rounds);
            }
        }

        let classifier = GbdtClassifier::new(dataset.feature_count, base_scores.to_vec(), trees);
        classifier
            .validate()
            .map_err(|e| TrainerError::Training(e.to_string()))?;

        Ok(TrainedModel {
            classifier,
            feature_gains,
        })
    }

    /// Laplace-smoothed log prior per class, so an absent class still has a
    /// finite score.
    fn base_scores(counts: &[usize; NUM_CLASSES], n: usize) -> [i64; NUM_CLASSES] {
        let mut scores = [0i64; NUM_CLASSES];
        for (score, count) in scores.iter_mut().zip(counts) {
            let prior = (*count as f64 + 1.0) / (n as f64 + NUM_CLASSES as f64);
            *score = to_fixed(prior.ln(), SCALE);
        }
        scores
    }

    /// Softmax cross-entropy: `g = p - y`, `h = p (1 - p)`, at `SCALE`
    fn gradients_hessians(
        probs: &[Vec<f64>],
        labels: &[CrowdLevel],
        class: usize,
    ) -> (Vec<i64>, Vec<i64>) {
        probs
            .iter()
            .zip(labels)
            .map(|(p, label)| {
                let p = p[class];
                let y = if label.index() == class { 1.0 } else { 0.0 };
                let g = to_fixed(p - y, SCALE);
                let h = to_fixed(p * (1.0 - p), SCALE).max(MIN_HESSIAN);
                (g, h)
            })
            .unzip()
    }

    /// Same weighting as `GbdtClassifier::raw_scores`
    fn contribution(tree: &Tree, features: &[i64]) -> i64 {
        let leaf = tree.evaluate(features) as i128;
        let value = leaf * tree.weight as i128 / SCALE as i128;
        value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// Mean multi-class log-loss of raw scores against labels
fn log_loss(raw: &[[i64; NUM_CLASSES]], labels: &[CrowdLevel]) -> f64 {
    if raw.is_empty() {
        return 0.0;
    }
    let total: f64 = raw
        .iter()
        .zip(labels)
        .map(|(scores, label)| -softmax(scores, SCALE)[label.index()].max(1e-15).ln())
        .sum();
    total / raw.len() as f64
}
