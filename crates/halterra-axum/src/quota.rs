//! Per-route quota middleware and rate-limit headers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::SecondsFormat;
use halterra_core::{ClientIdentity, QuotaDecision, QuotaTracker, Remaining, ResourceKey};
use tracing::{debug, warn};

use crate::error::HttpError;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Middleware state: which tracker to ask and for which resource.
#[derive(Clone)]
pub struct QuotaGuard {
    pub tracker: Arc<QuotaTracker>,
    pub resource: ResourceKey,
}

/// Identify the caller: first `X-Forwarded-For` hop, then `X-Real-IP`, then
/// the socket peer when the server was started with connect info.
pub fn client_identity(req: &Request) -> ClientIdentity {
    let headers = req.headers();
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());
    let real_ip = headers.get("x-real-ip").and_then(|v| v.to_str().ok());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    ClientIdentity::resolve(forwarded_for, real_ip, peer)
}

/// Write the `X-RateLimit-*` headers, plus `Retry-After` on rejection.
///
/// Unmetered decisions only carry `X-RateLimit-Limit: N/A`.
pub(crate) fn apply_quota_headers(headers: &mut HeaderMap, decision: &QuotaDecision) {
    let Some(limit) = decision.limit else {
        headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from_static("N/A"));
        return;
    };

    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(limit));
    if let Remaining::Limited(remaining) = decision.remaining {
        headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
    }

    let reset = decision
        .reset_at()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(X_RATELIMIT_RESET.clone(), value);
    }

    if let Some(retry_after) = decision.retry_after_secs {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    }
}

/// Consume one unit of the route's quota or answer `429`.
pub async fn enforce_quota(State(guard): State<QuotaGuard>, req: Request, next: Next) -> Response {
    let client = client_identity(&req);
    let decision = guard.tracker.check_and_consume(&client, &guard.resource);

    if !decision.allowed {
        warn!(
            client = %client,
            resource = %guard.resource,
            retry_after = decision.retry_after_secs,
            "Quota exceeded"
        );
        return HttpError::QuotaExceeded(decision).into_response();
    }

    debug!(
        client = %client,
        resource = %guard.resource,
        remaining = ?decision.remaining,
        "Quota check passed"
    );

    let mut response = next.run(req).await;
    apply_quota_headers(response.headers_mut(), &decision);
    response
}
