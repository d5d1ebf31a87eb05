//! Crowdcast service CLI
//!
//! Runs one operation and prints its JSON response, or serves
//! newline-delimited JSON requests from stdin.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crowdcast_service::{CrowdService, ServiceConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "crowdcast-service")]
#[command(author = "Crowdcast Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Crowd-level prediction and enrollment analytics", long_about = None)]
struct Args {
    /// TOML configuration file (falls back to CROWDCAST_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Service and artifact status
    Health,
    /// Loaded model description
    ModelInfo,
    /// Predict the crowd level for one JSON payload
    Predict {
        /// Inline JSON payload
        #[arg(long, conflicts_with = "file")]
        payload: Option<String>,
        /// File holding the JSON payload
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Summary statistics, optionally for one district
    Statistics {
        #[arg(long)]
        district: Option<String>,
    },
    /// Monthly and weekday totals
    Trends {
        #[arg(long)]
        district: Option<String>,
    },
    /// Known district names
    Districts,
    /// Per-weekday average counts for a district
    DistrictAverages { district: String },
    /// Aggregate analytics
    Analytics {
        #[arg(long)]
        district: Option<String>,
    },
    /// Answer newline-delimited JSON requests from stdin
    Serve,
}

/// One line of the `serve` protocol
#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
enum Request {
    Health,
    ModelInfo,
    Predict { payload: Value },
    Statistics { district: Option<String> },
    Trends { district: Option<String> },
    Districts,
    DistrictAverages { district: String },
    Analytics { district: Option<String> },
    Reload,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    info!("Crowdcast Service v{}", env!("CARGO_PKG_VERSION"));
    info!("Model path: {}", config.model_path.display());
    info!("Schema path: {}", config.schema_path.display());

    let service = CrowdService::start(config);
    let health = service.health();
    if let Some(h) = &health.data {
        if !h.model_loaded {
            warn!("Model not loaded; run crowdcast-train first");
        }
        if !h.data_loaded {
            warn!("Historical data not loaded; statistics will be empty");
        }
    }

    match args.command {
        Command::Health => print_json(&health),
        Command::ModelInfo => print_json(&service.model_info()),
        Command::Predict { payload, file } => {
            let text = match (payload, file) {
                (Some(p), _) => p,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("predict needs --payload or --file"),
            };
            let payload: Value = serde_json::from_str(&text).context("Payload is not valid JSON")?;
            print_json(&service.predict(&payload))
        }
        Command::Statistics { district } => print_json(&service.statistics(district.as_deref())),
        Command::Trends { district } => print_json(&service.trends(district.as_deref())),
        Command::Districts => print_json(&service.districts()),
        Command::DistrictAverages { district } => {
            print_json(&service.district_averages(&district))
        }
        Command::Analytics { district } => print_json(&service.analytics(district.as_deref())),
        Command::Serve => serve(&service),
    }
}

fn serve(service: &CrowdService) -> Result<()> {
    info!("Serving requests from stdin");
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(service, request),
            Err(e) => serde_json::json!({
                "success": false,
                "error": format!("Invalid request: {e}"),
                "kind": "invalid_request",
            }),
        };
        serde_json::to_writer(&mut stdout, &response)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }
    Ok(())
}

fn dispatch(service: &CrowdService, request: Request) -> Value {
    let value = match request {
        Request::Health => serde_json::to_value(service.health()),
        Request::ModelInfo => serde_json::to_value(service.model_info()),
        Request::Predict { payload } => serde_json::to_value(service.predict(&payload)),
        Request::Statistics { district } => {
            serde_json::to_value(service.statistics(district.as_deref()))
        }
        Request::Trends { district } => serde_json::to_value(service.trends(district.as_deref())),
        Request::Districts => serde_json::to_value(service.districts()),
        Request::DistrictAverages { district } => {
            serde_json::to_value(service.district_averages(&district))
        }
        Request::Analytics { district } => {
            serde_json::to_value(service.analytics(district.as_deref()))
        }
        Request::Reload => serde_json::to_value(service.reload()),
    };
    value.unwrap_or_else(|e| {
        serde_json::json!({"success": false, "error": e.to_string(), "kind": "internal"})
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{json}");
    Ok(())
}

/// Initialize logging; `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
