//! Single-record crowd-level prediction

use chrono::{Datelike, Utc};
use crowdcast_core::{ClassProbabilities, CrowdLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::ServiceError;
use crate::request::PredictionRequest;
use crate::state::AppState;

pub const UNSEEN_DISTRICT_WARNING: &str =
    "District not in training data - using general patterns";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSummary {
    pub total_enrolment: i64,
    pub total_biometric: i64,
    pub district: String,
    /// `month/day` from the parsed values, so `"01"` is echoed as `1`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: CrowdLevel,
    pub probabilities: ClassProbabilities,
    pub confidence: f64,
    pub input_summary: InputSummary,
    pub district_in_training: bool,
    pub warning: Option<String>,
}

/// Year applied when the payload has none
pub fn default_year(state: &AppState) -> i32 {
    state.config.default_year.unwrap_or_else(|| Utc::now().year())
}

pub fn predict(state: &AppState, payload: &Value) -> Result<PredictionResponse, ServiceError> {
    let artifacts = state.model.artifacts().ok_or_else(|| {
        ServiceError::Unavailable("Model not loaded. Please check model files.".into())
    })?;

    let request = PredictionRequest::from_value(payload)?;
    let record = request.to_record(default_year(state));
    debug!(
        "Predicting {} {}/{}/{} ({})",
        record.district, record.year, record.month, record.day, record.day_of_week
    );

    let aligned = artifacts.predict_record(&record)?;
    let prediction = aligned.prediction;

    Ok(PredictionResponse {
        prediction: prediction.level,
        probabilities: prediction.probabilities,
        confidence: prediction.confidence,
        input_summary: InputSummary {
            total_enrolment: record.total_enrolment() as i64,
            total_biometric: record.total_biometric() as i64,
            district: request.district.clone(),
            date: format!("{}/{}", request.month, request.day),
        },
        district_in_training: aligned.district_in_training,
        warning: (!aligned.district_in_training).then(|| UNSEEN_DISTRICT_WARNING.to_string()),
    })
}
