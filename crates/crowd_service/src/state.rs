//! Shared service state
//!
//! An [`AppState`] is built once, published behind an `Arc`, and never
//! mutated afterwards. Requests work on a snapshot; a reload builds a new
//! state off-lock and swaps the pointer.

use chrono::{DateTime, Utc};
use crowdcast_core::{load_merged, MergedTable, ModelArtifacts};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;

/// Merged historical data, or why it could not be loaded
#[derive(Debug, Clone)]
pub enum DataStatus {
    Loaded(MergedTable),
    Unavailable(String),
}

impl DataStatus {
    pub fn table(&self) -> Option<&MergedTable> {
        match self {
            DataStatus::Loaded(table) => Some(table),
            DataStatus::Unavailable(_) => None,
        }
    }
}

/// Model plus schema, or why they could not be loaded
#[derive(Debug, Clone)]
pub enum ModelStatus {
    Loaded(Box<ModelArtifacts>),
    Unavailable(String),
}

impl ModelStatus {
    pub fn artifacts(&self) -> Option<&ModelArtifacts> {
        match self {
            ModelStatus::Loaded(artifacts) => Some(&**artifacts),
            ModelStatus::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub dataset: DataStatus,
    pub model: ModelStatus,
    pub loaded_at: DateTime<Utc>,
}

impl AppState {
    /// Load model and data; failures are recorded, not returned.
    #[instrument(skip_all)]
    pub fn load(config: ServiceConfig) -> Self {
        let model = match ModelArtifacts::load(&config.model_path, &config.schema_path) {
            Ok(artifacts) => {
                info!(
                    "Model loaded: {} features, hash {}",
                    artifacts.schema.len(),
                    artifacts.model_hash
                );
                ModelStatus::Loaded(Box::new(artifacts))
            }
            Err(e) => {
                warn!("Model not loaded from {}: {}", config.model_path.display(), e);
                ModelStatus::Unavailable(e.to_string())
            }
        };

        let dataset = match config.normalizer() {
            Err(e) => {
                warn!("Data not loaded: {}", e);
                DataStatus::Unavailable(e.to_string())
            }
            Ok(normalizer) => {
                match load_merged(&config.updates_csv, &config.enrollments_csv, &normalizer) {
                    Ok(table) => {
                        info!(
                            "Data loaded: {} records, {} districts",
                            table.len(),
                            table.districts().len()
                        );
                        DataStatus::Loaded(table)
                    }
                    Err(e) => {
                        warn!("Could not load data for statistics: {}", e);
                        DataStatus::Unavailable(e.to_string())
                    }
                }
            }
        };

        Self::from_parts(config, dataset, model)
    }

    pub fn from_parts(config: ServiceConfig, dataset: DataStatus, model: ModelStatus) -> Self {
        Self {
            config,
            dataset,
            model,
            loaded_at: Utc::now(),
        }
    }
}

/// Atomically swappable handle to the current [`AppState`]
#[derive(Debug)]
pub struct StateHandle {
    inner: RwLock<Arc<AppState>>,
}

impl StateHandle {
    pub fn new(state: AppState) -> Self {
        Self {
            inner: RwLock::new(Arc::new(state)),
        }
    }

    /// Current state; stays valid across later reloads.
    pub fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.inner.read())
    }

    pub fn replace(&self, state: AppState) -> Arc<AppState> {
        let next = Arc::new(state);
        *self.inner.write() = Arc::clone(&next);
        next
    }

    /// Reload from the current configuration.
    pub fn reload(&self) -> Arc<AppState> {
        let config = self.snapshot().config.clone();
        self.replace(AppState::load(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_state() -> AppState {
        AppState::from_parts(
            ServiceConfig::default(),
            DataStatus::Loaded(MergedTable::new(vec![])),
            ModelStatus::Unavailable("no model".into()),
        )
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let handle = StateHandle::new(empty_state());
        let before = handle.snapshot();

        let next = AppState::from_parts(
            ServiceConfig::default(),
            DataStatus::Unavailable("gone".into()),
            ModelStatus::Unavailable("no model".into()),
        );
        handle.replace(next);

        assert!(before.dataset.table().is_some());
        assert!(handle.snapshot().dataset.table().is_none());
    }

    #[test]
    fn test_load_with_missing_files_degrades() {
        let config = ServiceConfig {
            model_path: "/nonexistent/model.json".into(),
            updates_csv: "/nonexistent/u.csv".into(),
            ..ServiceConfig::default()
        };
        let state = AppState::load(config);
        assert!(state.model.artifacts().is_none());
        assert!(state.dataset.table().is_none());
    }
}
