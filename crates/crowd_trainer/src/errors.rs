use crowdcast_core::CoreError;
use thiserror::Error;

/// Errors returned by the offline trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}
