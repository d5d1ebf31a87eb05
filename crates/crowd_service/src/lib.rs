//! Crowdcast Service - crowd-level prediction and enrollment analytics
//!
//! Loads a trained classifier and the merged historical tables once, then
//! answers prediction, statistics, trend and analytics requests against an
//! immutable snapshot. Every operation returns an [`ApiResponse`].

pub mod analytics;
pub mod config;
pub mod errors;
pub mod health;
pub mod predict;
pub mod request;
pub mod service;
pub mod state;

pub use analytics::{
    Analytics, DayAverages, DistrictAverages, DistrictList, Statistics, Trends, WeeklyAverages,
};
pub use config::ServiceConfig;
pub use errors::{ApiResponse, ConfigError, ErrorKind, RequestError, ServiceError};
pub use health::{HealthResponse, ModelInfo};
pub use predict::{PredictionResponse, UNSEEN_DISTRICT_WARNING};
pub use request::PredictionRequest;
pub use service::CrowdService;
pub use state::{AppState, DataStatus, ModelStatus, StateHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
