//! Crowdcast trainer CLI
//!
//! Trains the crowd-level classifier from the update and enrollment CSVs.

use anyhow::{Context, Result};
use clap::Parser;
use crowdcast_trainer::{run_training, TrainerConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "crowdcast-train")]
#[command(author = "Crowdcast Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic crowd-level GBDT trainer", long_about = None)]
struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Biometric update CSV
    #[arg(long)]
    updates: Option<PathBuf>,

    /// Enrollment CSV
    #[arg(long)]
    enrollments: Option<PathBuf>,

    /// Output directory for model, hash, schema and report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Boosting rounds (one tree per class each)
    #[arg(long)]
    rounds: Option<usize>,

    #[arg(long)]
    max_depth: Option<usize>,

    #[arg(long)]
    min_samples_leaf: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Fraction of rows held out for evaluation
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Seed for the stratified split
    #[arg(long)]
    seed: Option<u64>,

    /// District normaliser preset (`none`, `andhra_pradesh`)
    #[arg(long)]
    districts: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<TrainerConfig> {
        let mut config = match &self.config {
            Some(path) => TrainerConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TrainerConfig::default(),
        };

        if let Some(v) = self.updates {
            config.updates_csv = v;
        }
        if let Some(v) = self.enrollments {
            config.enrollments_csv = v;
        }
        if let Some(v) = self.output {
            config.output_dir = v;
        }
        if let Some(v) = self.rounds {
            config.params.rounds = v;
        }
        if let Some(v) = self.max_depth {
            config.params.max_depth = v;
        }
        if let Some(v) = self.min_samples_leaf {
            config.params.min_samples_leaf = v;
        }
        if let Some(v) = self.learning_rate {
            config.params.learning_rate = v;
        }
        if let Some(v) = self.test_fraction {
            config.test_fraction = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.districts {
            config.district_preset = v;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // RUST_LOG, when set, takes precedence over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Crowdcast Trainer v{}", env!("CARGO_PKG_VERSION"));

    let config = args.into_config()?;
    config.validate().context("Invalid trainer configuration")?;

    info!("Training configuration:");
    info!("  Rounds: {}", config.params.rounds);
    info!("  Max depth: {}", config.params.max_depth);
    info!("  Min samples per leaf: {}", config.params.min_samples_leaf);
    info!("  Learning rate: {}", config.params.learning_rate);
    info!("  Test fraction: {}", config.test_fraction);
    info!("  Seed: {}", config.seed);
    info!("  District preset: {}", config.district_preset);

    let outcome = run_training(&config).context("Training failed")?;

    info!("Training completed successfully");
    if let Some(eval) = &outcome.report.evaluation {
        info!("  Accuracy: {:.4} on {} rows", eval.accuracy, eval.samples);
    }
    info!("  Model: {}", outcome.model_path.display());
    info!("  Report: {}", outcome.report_path.display());

    Ok(())
}
