//! Service facade
//!
//! Wraps every operation in an [`ApiResponse`] and runs it against a single
//! state snapshot.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analytics::{self, Analytics, DistrictAverages, DistrictList, Statistics, Trends};
use crate::config::ServiceConfig;
use crate::errors::{ApiResponse, ServiceError};
use crate::health::{self, HealthResponse, ModelInfo};
use crate::predict::{self, PredictionResponse};
use crate::state::{AppState, StateHandle};

pub struct CrowdService {
    state: StateHandle,
}

impl CrowdService {
    /// Load model and data from `config`. Never fails; missing pieces are
    /// reported by `health`.
    pub fn start(config: ServiceConfig) -> Self {
        Self::with_state(AppState::load(config))
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            state: StateHandle::new(state),
        }
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        self.state.snapshot()
    }

    pub fn reload(&self) -> ApiResponse<HealthResponse> {
        info!("Reloading model and data");
        let state = self.state.reload();
        ApiResponse::ok(health::health(&state))
    }

    pub fn health(&self) -> ApiResponse<HealthResponse> {
        ApiResponse::ok(health::health(&self.snapshot()))
    }

    pub fn model_info(&self) -> ApiResponse<ModelInfo> {
        respond("model_info", health::model_info(&self.snapshot()))
    }

    pub fn predict(&self, payload: &Value) -> ApiResponse<PredictionResponse> {
        respond("predict", predict::predict(&self.snapshot(), payload))
    }

    pub fn statistics(&self, district: Option<&str>) -> ApiResponse<Statistics> {
        respond("statistics", analytics::statistics(&self.snapshot(), district))
    }

    pub fn trends(&self, district: Option<&str>) -> ApiResponse<Trends> {
        respond("trends", analytics::trends(&self.snapshot(), district))
    }

    pub fn districts(&self) -> ApiResponse<DistrictList> {
        ApiResponse::ok(analytics::districts(&self.snapshot()))
    }

    pub fn district_averages(&self, district: &str) -> ApiResponse<DistrictAverages> {
        ApiResponse::ok(analytics::district_averages(&self.snapshot(), district))
    }

    pub fn analytics(&self, district: Option<&str>) -> ApiResponse<Analytics> {
        respond("analytics", analytics::analytics(&self.snapshot(), district))
    }
}

fn respond<T>(operation: &str, result: Result<T, ServiceError>) -> ApiResponse<T> {
    if let Err(e) = &result {
        warn!("{operation} failed ({:?}): {e}", e.kind());
    }
    ApiResponse::from_result(result)
}
