//! Service error types and the response envelope

use crowdcast_core::CoreError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse error category reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    Unavailable,
    Internal,
}

/// Service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Unavailable(_) => ErrorKind::Unavailable,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn district_not_found(district: &str) -> Self {
        ServiceError::NotFound(format!("No data found for district: {district}"))
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

/// Problems with a prediction payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl RequestError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        RequestError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {variable}: {value:?}")]
    InvalidEnv { variable: String, value: String },

    #[error("Unknown district preset: {0}")]
    UnknownPreset(String),
}

/// Envelope for every service operation.
///
/// Serialises as `{"success": true, ...data}` or
/// `{"success": false, "error": "...", "kind": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn err(error: &ServiceError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }

    pub fn from_result(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Payload {
        districts: Vec<String>,
    }

    #[test]
    fn test_success_envelope_flattens_payload() {
        let resp = ApiResponse::ok(Payload {
            districts: vec!["Guntur".into()],
        });
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"success": true, "districts": ["Guntur"]})
        );
    }

    #[test]
    fn test_error_envelope() {
        let resp: ApiResponse<Payload> =
            ApiResponse::err(&ServiceError::district_not_found("Atlantis"));
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({
                "success": false,
                "error": "No data found for district: Atlantis",
                "kind": "not_found"
            })
        );
    }

    #[test]
    fn test_missing_fields_message_lists_all() {
        let err = ServiceError::from(RequestError::MissingFields(vec![
            "month".into(),
            "district".into(),
        ]));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.to_string(), "Missing required fields: month, district");
    }
}
