//! API error type mapped to HTTP status codes.
//!
//! Every pipeline error becomes a `400` with the body `{"error": "message"}`.
//! The message is the error's display form and never carries internal
//! detail beyond it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
///
/// - `BadRequest` → 400
/// - `ServiceUnavailable` → 503
#[derive(Debug)]
pub enum ApiError {
    /// The request could not be served (400).
    BadRequest(String),
    /// The store could not be reached (503).
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<nls_core::Error> for ApiError {
    fn from(err: nls_core::Error) -> Self {
        tracing::debug!(kind = ?err.kind(), error = %err, "Request failed");
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_are_bad_requests() {
        let err: ApiError = nls_core::Error::config("Unknown provider: nope").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_service_unavailable_status() {
        let response = ApiError::ServiceUnavailable("down".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
