//! End-to-end training run: load, label, encode, split, train, evaluate and
//! write artifacts.

use chrono::{DateTime, Utc};
use crowdcast_core::artifacts::REPORT_FILE;
use crowdcast_core::gbdt::{GbdtClassifier, Tree};
use crowdcast_core::{load_merged, CoreError, CrowdLevel, ModelArtifacts, Prediction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::TrainerConfig;
use crate::dataset::Dataset;
use crate::errors::TrainerError;
use crate::evaluation::{rank_importance, EvaluationReport, FeatureImportance};
use crate::trainer::{GbdtTrainer, TrainingParams};

/// Number of features listed in the log and report summary
pub const TOP_FEATURES: usize = 10;

/// Contents of `training_report.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub created_at: DateTime<Utc>,
    pub trainer_version: String,
    pub model_hash: String,
    pub merged_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_count: usize,
    /// Deepest tree in the trained model
    pub max_tree_depth: usize,
    pub class_distribution: BTreeMap<CrowdLevel, usize>,
    /// Tertile cut-points of `total_biometric` used for labels
    pub bucket_edges: Vec<f64>,
    pub test_fraction: f64,
    pub seed: u64,
    pub params: TrainingParams,
    /// Held-out metrics; absent when the test split is empty
    pub evaluation: Option<EvaluationReport>,
    pub feature_importance: Vec<FeatureImportance>,
}

/// Where a run wrote its outputs
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model_path: PathBuf,
    pub report_path: PathBuf,
    pub report: TrainingReport,
}

/// Class of one fixed-point row under the serving tie-break rule.
pub fn predict_fixed(classifier: &GbdtClassifier, row: &[i64]) -> Result<CrowdLevel, TrainerError> {
    let probs = crowdcast_core::gbdt::softmax(&classifier.raw_scores(row), classifier.scale);
    let weights: [f64; 3] = probs
        .as_slice()
        .try_into()
        .map_err(|_| TrainerError::Training(format!("expected 3 classes, got {}", probs.len())))?;
    let prediction = Prediction::from_weights(weights).map_err(CoreError::from)?;
    Ok(prediction.level)
}

pub fn run_training(config: &TrainerConfig) -> Result<TrainingOutcome, TrainerError> {
    config.validate()?;

    info!("Loading updates from: {}", config.updates_csv.display());
    info!("Loading enrollments from: {}", config.enrollments_csv.display());
    let table = load_merged(
        &config.updates_csv,
        &config.enrollments_csv,
        &config.normalizer()?,
    )
    .map_err(CoreError::from)?;

    let prepared = Dataset::from_table(&table)?;
    let distribution = {
        let counts = prepared.dataset.class_counts();
        CrowdLevel::ALL
            .iter()
            .filter(|l| counts[l.index()] > 0)
            .map(|l| (*l, counts[l.index()]))
            .collect::<BTreeMap<_, _>>()
    };
    info!("Crowd level distribution: {:?}", distribution);
    let available = prepared.buckets.available_levels();
    if available.len() < CrowdLevel::ALL.len() {
        warn!(
            "Bucket edges {:?} collapse to {} crowd levels",
            prepared.buckets.edges,
            available.len()
        );
    }
    info!(
        "Feature matrix: {} rows x {} columns",
        prepared.dataset.len(),
        prepared.schema.len()
    );
    debug!("Feature statistics (fixed-point):");
    for (column, (min, max)) in prepared
        .schema
        .columns()
        .iter()
        .zip(prepared.dataset.feature_stats())
    {
        debug!("  {:<28} min={} max={}", column, min, max);
    }

    let (train, test) = prepared
        .dataset
        .stratified_split(config.test_fraction, config.seed)?;
    info!("Training samples: {}, testing samples: {}", train.len(), test.len());

    let trainer = GbdtTrainer::new(config.params.clone());
    let trained = trainer.train(&train)?;
    let max_tree_depth = trained
        .classifier
        .trees
        .iter()
        .flatten()
        .map(Tree::depth)
        .max()
        .unwrap_or(0);
    info!(
        "Trained {} trees, max depth {}",
        trained.classifier.num_trees(),
        max_tree_depth
    );

    let evaluation = if test.is_empty() {
        warn!("Test split is empty, skipping evaluation");
        None
    } else {
        let predicted = test
            .features
            .iter()
            .map(|row| predict_fixed(&trained.classifier, row))
            .collect::<Result<Vec<_>, _>>()?;
        let report = EvaluationReport::from_predictions(&test.labels, &predicted);
        info!("Accuracy: {:.4}", report.accuracy);
        for m in &report.per_class {
            info!(
                "  {:<6} precision={:.3} recall={:.3} f1={:.3} support={}",
                m.label, m.precision, m.recall, m.f1, m.support
            );
        }
        info!("Confusion matrix: {:?}", report.confusion_matrix);
        Some(report)
    };

    let importance = rank_importance(prepared.schema.columns(), &trained.feature_gains);
    info!("Top {} features:", TOP_FEATURES);
    for f in importance.iter().take(TOP_FEATURES) {
        info!("  {:<28} {:.4}", f.feature, f.importance);
    }

    let artifacts = ModelArtifacts::new(trained.classifier, prepared.schema)?;
    let model_path = artifacts.save_to_dir(&config.output_dir)?;

    let report = TrainingReport {
        created_at: Utc::now(),
        trainer_version: crate::VERSION.to_string(),
        model_hash: artifacts.model_hash.clone(),
        merged_rows: table.len(),
        train_rows: train.len(),
        test_rows: test.len(),
        feature_count: artifacts.schema.len(),
        max_tree_depth,
        class_distribution: distribution,
        bucket_edges: prepared.buckets.edges,
        test_fraction: config.test_fraction,
        seed: config.seed,
        params: config.params.clone(),
        evaluation,
        feature_importance: importance,
    };

    let report_path = config.output_dir.join(REPORT_FILE);
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

    info!("Model: {} ({})", model_path.display(), artifacts.model_hash);
    info!("Report: {}", report_path.display());

    Ok(TrainingOutcome {
        model_path,
        report_path,
        report,
    })
}
