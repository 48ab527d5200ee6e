//! HTTP API error type

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP callers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller sent a malformed request (bad base64, missing fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<geolens_common::Error> for ApiError {
    fn from(err: geolens_common::Error) -> Self {
        match err {
            geolens_common::Error::InvalidInput(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_maps_to_400() {
        let (status, code) = ApiError::InvalidRequest("bad".to_string()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "invalid_request");
    }

    #[test]
    fn test_common_error_conversion() {
        let err: ApiError = geolens_common::Error::InvalidInput("no".to_string()).into();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err: ApiError = geolens_common::Error::Config("x".to_string()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
