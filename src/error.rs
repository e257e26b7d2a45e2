use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::admission::Overloaded;
use crate::category::CategoryRegistry;

/// Failures talking to the backing image store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to backing store: {0}")]
    Connect(String),

    #[error("backing store query failed: {0}")]
    Query(String),

    #[error("backing store did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// Failures of the fetch pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unknown category '{key}'")]
    UnknownCategory { key: String },

    #[error("backing store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("backing store returned no images for collection '{collection}'")]
    EmptySample { collection: String },

    #[error("failed to load images after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether a reload attempt that failed this way is worth repeating.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::StoreUnavailable(_) | FetchError::EmptySample { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Request-level failures, rendered through [`ErrorResponse`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("style conversion is not supported for category '{0}'")]
    StyleUnsupported(String),

    #[error("too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error(transparent)]
    Overloaded(#[from] Overloaded),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::StyleUnsupported(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Fetch(FetchError::UnknownCategory { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Fetch(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            ApiError::Overloaded(_) => Some(1),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Error envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_types: Option<Vec<&'static str>>,
}

impl ErrorResponse {
    pub fn new(kind: &str, message: &str, code: u16) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code,
                message: message.to_string(),
                kind: kind.to_string(),
            },
            valid_types: None,
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        let code = err.status().as_u16();
        let message = err.to_string();
        match err {
            ApiError::InvalidRequest(_) => Self::new("bad_request", &message, code),
            ApiError::StyleUnsupported(_) => Self::new("style_unsupported", &message, code),
            ApiError::RateLimited { .. } => Self::new("rate_limit_exceeded", &message, code),
            ApiError::Overloaded(_) => Self::new("overloaded", &message, code),
            ApiError::Fetch(FetchError::UnknownCategory { .. }) => {
                let mut response = Self::new("unknown_category", &message, code);
                response.valid_types = Some(CategoryRegistry::default().keys());
                response
            }
            ApiError::Fetch(_) => Self::new("fetch_failed", &message, code),
            ApiError::Internal(_) => Self::new("internal_error", &message, code),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut response = (status, Json(ErrorResponse::from_api_error(&self))).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if let Some(secs) = self.retry_after() {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::EmptySample { collection: "api_ysh".into() }.is_transient());
        assert!(FetchError::StoreUnavailable(StoreError::Query("boom".into())).is_transient());
        assert!(!FetchError::UnknownCategory { key: "zzz".into() }.is_transient());
    }

    #[test]
    fn test_status_mapping() {
        let unknown = ApiError::Fetch(FetchError::UnknownCategory { key: "zzz".into() });
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

        let exhausted = ApiError::Fetch(FetchError::ExhaustedRetries {
            attempts: 3,
            source: Box::new(FetchError::EmptySample { collection: "api_ysh".into() }),
        });
        assert_eq!(exhausted.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let overloaded = ApiError::from(Overloaded { timeout: Duration::from_secs(5) });
        assert_eq!(overloaded.status(), StatusCode::SERVICE_UNAVAILABLE);

        let limited = ApiError::RateLimited { retry_after_secs: 12 };
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_unknown_category_lists_valid_types() {
        let err = ApiError::Fetch(FetchError::UnknownCategory { key: "zzz".into() });
        let body = serde_json::to_value(ErrorResponse::from_api_error(&err)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], 400);
        assert_eq!(body["error"]["type"], "unknown_category");
        assert_eq!(body["valid_types"][0], "ysh");
    }

    #[test]
    fn test_plain_errors_omit_valid_types() {
        let body =
            serde_json::to_value(ErrorResponse::from_api_error(&ApiError::Internal("x".into())))
                .unwrap();
        assert!(body.get("valid_types").is_none());
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 7 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }
}
