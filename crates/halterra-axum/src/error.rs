//! Axum-specific error types and mappings.
//!
//! Maps pipeline failures to HTTP status codes and JSON bodies. Upstream and
//! internal details are logged here and never sent to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use halterra_core::{CoreError, QuotaDecision, UpstreamError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::quota::apply_quota_headers;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Missing or malformed request input.
    #[error("Bad request: {0}")]
    Validation(String),

    /// Cross-origin request from outside the allowlist.
    #[error("Origin not allowed")]
    OriginRejected,

    /// The client's quota window for this resource is exhausted.
    #[error("Quota exceeded")]
    QuotaExceeded(QuotaDecision),

    /// An upstream service failed; only `public_message` reaches the client.
    #[error("{public_message}: {source}")]
    Upstream {
        public_message: &'static str,
        source: UpstreamError,
    },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub const fn upstream(public_message: &'static str, source: UpstreamError) -> Self {
        Self::Upstream {
            public_message,
            source,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::OriginRejected => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Forbidden",
                    "message": "Origin not allowed",
                })),
            )
                .into_response(),
            Self::QuotaExceeded(decision) => {
                let body = json!({
                    "error": "Too Many Requests",
                    "message": decision.message.as_deref().unwrap_or_default(),
                    "retryAfter": decision.retry_after_secs.unwrap_or_default(),
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                apply_quota_headers(response.headers_mut(), &decision);
                response
            }
            Self::Upstream {
                public_message,
                source,
            } => {
                error!(
                    service = source.service,
                    kind = %source.kind,
                    status = ?source.status,
                    error = %source,
                    "Upstream failure surfaced to client"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": public_message })),
                )
                    .into_response()
            }
            Self::Internal(detail) => {
                error!(detail = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::Upstream(source) => Self::upstream("Upstream service failed", source),
            CoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}
