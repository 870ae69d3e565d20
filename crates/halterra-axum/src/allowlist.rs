//! Cross-origin gate in front of every `/api` route.
//!
//! Unlike `tower_http::cors`, this layer rejects disallowed origins outright
//! instead of only withholding the CORS headers, so a script on a foreign
//! page cannot spend anyone's quota.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::error::HttpError;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, \
                             Content-Length, Content-MD5, Content-Type, Date, X-Api-Version";

/// Origins used when none are configured: production plus local dev servers.
pub const DEFAULT_ORIGINS: &[&str] = &[
    "https://halterra.vercel.app",
    "https://halterra-danny.vercel.app",
    "https://halterra-gqtkxmi0p-dannys-projects-ff6db2ea.vercel.app",
    "http://localhost:5173",
    "http://localhost:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:3000",
];

/// Immutable set of exact-match origins.
#[derive(Debug, Clone)]
pub struct Allowlist {
    origins: Arc<HashSet<String>>,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGINS.iter().copied())
    }
}

impl Allowlist {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origins: Arc::new(origins.into_iter().map(Into::into).collect()),
        }
    }

    pub fn contains(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

fn annotate(headers: &mut HeaderMap, origin: &str) {
    let Ok(origin) = HeaderValue::from_str(origin) else {
        return;
    };
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
}

/// Gate middleware.
///
/// - `OPTIONS` always ends here with an empty `200`, annotated only when
///   the origin is allowlisted.
/// - A present, non-allowlisted origin gets `403`.
/// - An allowlisted origin passes through and is echoed on the response.
/// - No origin at all passes through untouched.
pub async fn allowlist_gate(
    State(allowlist): State<Allowlist>,
    req: Request,
    next: Next,
) -> Response {
    // An origin that is not valid UTF-8 can never match, so it is rejected
    // like any other unknown origin.
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .map(|value| value.to_str().unwrap_or_default().to_owned());
    let allowed = origin.as_deref().is_some_and(|o| allowlist.contains(o));

    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        match origin.as_deref() {
            Some(origin) if allowed => annotate(response.headers_mut(), origin),
            Some(origin) => warn!(origin, path = %req.uri().path(), "Preflight from origin not allowed"),
            None => debug!(path = %req.uri().path(), "Preflight without origin"),
        }
        return response;
    }

    match origin {
        Some(origin) if allowed => {
            let mut response = next.run(req).await;
            annotate(response.headers_mut(), &origin);
            response
        }
        Some(origin) => {
            warn!(origin = %origin, path = %req.uri().path(), "Origin not allowed");
            HttpError::OriginRejected.into_response()
        }
        None => next.run(req).await,
    }
}
