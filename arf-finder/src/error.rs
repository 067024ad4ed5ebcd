//! HTTP-facing error type
//!
//! Every handler returns [`ApiResult`]; lower-layer errors convert into
//! [`ApiError`] and render as `{"error": {"code", "message"}}`.

use crate::auth::CredentialError;
use crate::engine::resolve::ResolveError;
use crate::engine::AggregationError;
use crate::reports::AutomationLookupError;
use crate::source::SourceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing session or rejected credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Upstream platform call failed (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// arf-common error
    #[error("Common error: {0}")]
    Common(#[from] arf_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Upstream(msg) => {
                warn!(error = %msg, "Upstream failure");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg)
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NoRefreshToken => {
                ApiError::Unauthorized("not logged in to the marketing platform".to_string())
            }
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Credential(inner) => inner.into(),
            SourceError::Unauthorized(status) => ApiError::Unauthorized(format!(
                "upstream rejected credentials (status {})",
                status
            )),
            SourceError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            ResolveError::Source(source) => source.into(),
        }
    }
}

impl From<AggregationError> for ApiError {
    fn from(err: AggregationError) -> Self {
        match err {
            AggregationError::Fatal { field, source } => {
                warn!(field, error = %source, "Aggregation aborted");
                source.into()
            }
        }
    }
}

impl From<AutomationLookupError> for ApiError {
    fn from(err: AutomationLookupError) -> Self {
        match err {
            AutomationLookupError::UnsupportedType(kind) => {
                ApiError::BadRequest(format!("unsupported activity type {:?}", kind))
            }
            AutomationLookupError::NotFound(msg) => ApiError::NotFound(msg),
            AutomationLookupError::Source(source) => source.into(),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
