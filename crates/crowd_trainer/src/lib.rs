//! Crowdcast Trainer - Deterministic offline crowd-level trainer
//!
//! Builds the labelled feature matrix from the merged tables, fits a
//! multi-class fixed-point GBDT and writes the model, its hash, the feature
//! schema and a training report. Identical inputs and seed produce a
//! byte-identical model.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod evaluation;
pub mod pipeline;
pub mod trainer;

pub use config::TrainerConfig;
pub use dataset::{Dataset, PreparedData};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::TrainerError;
pub use evaluation::{rank_importance, ClassMetrics, EvaluationReport, FeatureImportance};
pub use pipeline::{run_training, TrainingOutcome, TrainingReport};
pub use trainer::{GbdtTrainer, TrainedModel, TrainingParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
