//! Health and model introspection

use crowdcast_core::CrowdPredictor;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` with a model loaded, `degraded` without one
    pub status: String,
    pub model_loaded: bool,
    pub feature_columns_loaded: bool,
    pub feature_count: usize,
    pub data_loaded: bool,
    pub data_records: usize,
    pub version: String,
}

pub fn health(state: &AppState) -> HealthResponse {
    let artifacts = state.model.artifacts();
    let table = state.dataset.table();

    HealthResponse {
        status: if artifacts.is_some() { "healthy" } else { "degraded" }.to_string(),
        model_loaded: artifacts.is_some(),
        feature_columns_loaded: artifacts.is_some(),
        feature_count: artifacts.map_or(0, |a| a.schema.len()),
        data_loaded: table.is_some(),
        data_records: table.map_or(0, |t| t.len()),
        version: crate::VERSION.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub features: Vec<String>,
    pub feature_count: usize,
    pub classes: Vec<String>,
    pub model_path: String,
    pub model_exists: bool,
    pub model_hash: String,
    pub tree_count: usize,
}

pub fn model_info(state: &AppState) -> Result<ModelInfo, ServiceError> {
    let artifacts = state
        .model
        .artifacts()
        .ok_or_else(|| ServiceError::Unavailable("Model not loaded".into()))?;
    let classifier = &artifacts.classifier;

    Ok(ModelInfo {
        model_type: classifier.model_type().to_string(),
        features: artifacts.schema.columns().to_vec(),
        feature_count: artifacts.schema.len(),
        classes: classifier.classes.clone(),
        model_path: state.config.model_path.display().to_string(),
        model_exists: state.config.model_path.exists(),
        model_hash: artifacts.model_hash.clone(),
        tree_count: classifier.num_trees(),
    })
}
