//! Crate-level HTTP error envelope.
//!
//! Internal component-to-component plumbing uses `anyhow::Result`; at the
//! HTTP boundary a failure is classified into one of the tagged variants
//! below and turned into a response by `IntoResponse`, the same shape
//! `auth.rs`'s `AuthError` uses.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Classification of an upstream-provider failure, surfaced verbatim in the
/// response envelope's `error.type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamErrorKind {
    Opensky,
    Network,
    Server,
}

/// Structured description of a degraded (but non-fatal) upstream call,
/// attached to an otherwise-successful response envelope so the UI can warn
/// without losing whatever data is already in hand.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamError {
    #[serde(rename = "type")]
    pub kind: UpstreamErrorKind,
    pub message: String,
    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Errors that abort request handling outright (as opposed to `UpstreamError`,
/// which degrades a response but still returns 200).
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Unauthorized(String),
    RateLimited {
        limit: u32,
        remaining: u32,
        reset_at: i64,
    },
    Upstream(UpstreamError),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(m) => write!(f, "validation error: {m}"),
            ApiError::NotFound(m) => write!(f, "not found: {m}"),
            ApiError::Unauthorized(m) => write!(f, "unauthorized: {m}"),
            ApiError::RateLimited { .. } => write!(f, "rate limited"),
            ApiError::Upstream(e) => write!(f, "upstream error: {}", e.message),
            ApiError::Internal(m) => write!(f, "internal error: {m}"),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "validation_error".to_string(),
                    message: Some(message),
                }),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: message,
                    message: None,
                }),
            )
                .into_response(),
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody {
                    error: "unauthorized".to_string(),
                    message: Some(message),
                }),
            )
                .into_response(),
            ApiError::RateLimited {
                limit,
                remaining,
                reset_at,
            } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": "rate_limited" })),
                )
                    .into_response();
                let headers = response.headers_mut();
                headers.insert("RateLimit-Limit", HeaderValue::from(limit));
                headers.insert("RateLimit-Remaining", HeaderValue::from(remaining));
                headers.insert("RateLimit-Reset", HeaderValue::from(reset_at));
                response
            }
            ApiError::Upstream(upstream) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": upstream })),
            )
                .into_response(),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "server_error".to_string(),
                    message: Some(message),
                }),
            )
                .into_response(),
        }
    }
}
