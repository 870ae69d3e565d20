//! Shared mapping from reqwest outcomes to [`UpstreamError`].

use std::time::Duration;

use halterra_core::UpstreamError;
use serde::Deserialize;
use tracing::debug;

/// `{"error":{"type":...,"message":...}}`, the shape Anthropic and several
/// other APIs use for error bodies.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Map a failed send or body read.
///
/// `limit` is the per-request timeout the call ran under. Without one, a
/// timeout can only come from the client's connect bound and is reported
/// as a transport failure.
pub fn from_reqwest(
    service: &'static str,
    err: &reqwest::Error,
    limit: Option<Duration>,
) -> UpstreamError {
    if err.is_timeout() {
        return match limit {
            Some(limit) => UpstreamError::timeout(service, limit),
            None => UpstreamError::transport(service, err.to_string()),
        };
    }
    if err.is_decode() {
        return UpstreamError::decode(service, err.to_string());
    }
    UpstreamError::transport(service, err.to_string())
}

/// Consume a non-success response into an error, keeping the structured
/// error type when the body carries one.
pub async fn from_status(service: &'static str, response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    debug!(service, status, body = %body, "Upstream returned an error status");

    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(ErrorEnvelope { error }) => {
            let message = error.message.unwrap_or_else(|| body.clone());
            let err = UpstreamError::http(service, status, message);
            match error.kind {
                Some(kind) => err.with_error_type(kind),
                None => err,
            }
        }
        Err(_) => UpstreamError::http(service, status, truncate(&body, 200)),
    }
}

/// Parse an error record that arrived inside a stream.
pub fn from_stream_error(service: &'static str, data: &str) -> UpstreamError {
    match serde_json::from_str::<ErrorEnvelope>(data) {
        Ok(ErrorEnvelope { error }) => {
            let err = UpstreamError::transport(
                service,
                error.message.unwrap_or_else(|| "stream error".to_string()),
            );
            match error.kind {
                Some(kind) => err.with_error_type(kind),
                None => err,
            }
        }
        Err(_) => UpstreamError::decode(service, truncate(data, 200)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
