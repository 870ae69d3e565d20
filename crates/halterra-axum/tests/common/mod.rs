//! Shared harness for halterra-axum router tests.
//!
//! Builds an `AxumContext` from the scripted fakes in `halterra_core::testing`
//! and a manual clock, so quota windows only move when a test says so.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, header};
use halterra_axum::{Allowlist, AxumContext, create_router};
use halterra_core::testing::{FakeSynthesizer, ScriptedGenerator, StaticInspiration};
use halterra_core::{
    DefaultPromptComposer, InMemoryQuotaStore, ManualClock, QuotaPolicies, QuotaTracker, Quote,
    RetryPolicy,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Allowlisted origin used by the harness.
pub const ORIGIN: &str = "http://localhost:5173";

/// Fixed start of the manual clock (2023-11-14T22:13:20Z).
pub const T0: i64 = 1_700_000_000_000;

pub struct TestApp {
    pub generator: Arc<ScriptedGenerator>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub quotas: Arc<QuotaTracker>,
    pub clock: Arc<ManualClock>,
    pub router: Router,
}

pub struct TestAppBuilder {
    generator: ScriptedGenerator,
    synthesizer: FakeSynthesizer,
    inspiration: StaticInspiration,
    policies: QuotaPolicies,
    idle_timeout: Option<Duration>,
}

impl TestAppBuilder {
    pub fn generator(mut self, generator: ScriptedGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn synthesizer(mut self, synthesizer: FakeSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn inspiration(mut self, inspiration: StaticInspiration) -> Self {
        self.inspiration = inspiration;
        self
    }

    pub fn policies(mut self, policies: QuotaPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    pub fn build(self) -> TestApp {
        let generator = Arc::new(self.generator);
        let synthesizer = Arc::new(self.synthesizer);
        let clock = Arc::new(ManualClock::new(T0));
        let quotas = Arc::new(QuotaTracker::new(
            self.policies,
            Arc::new(InMemoryQuotaStore::new()),
            clock.clone(),
        ));

        let ctx = AxumContext {
            quotas: quotas.clone(),
            allowlist: Allowlist::new([ORIGIN]),
            generator: generator.clone(),
            synthesizer: synthesizer.clone(),
            inspiration: Arc::new(self.inspiration),
            composer: Arc::new(DefaultPromptComposer::default()),
            // Short backoff keeps retry tests fast without paused time.
            retry: RetryPolicy::new(3, Duration::from_millis(5)),
            stream_idle_timeout: self.idle_timeout,
            shutdown: CancellationToken::new(),
        };

        TestApp {
            generator,
            synthesizer,
            quotas,
            clock,
            router: create_router(ctx),
        }
    }
}

pub fn app() -> TestAppBuilder {
    TestAppBuilder {
        generator: ScriptedGenerator::new(),
        synthesizer: FakeSynthesizer::returning(&b"ID3-fake-mp3"[..]),
        inspiration: StaticInspiration::new(Quote::new("Breathe in", "Anon")),
        policies: QuotaPolicies::builtin(),
        idle_timeout: None,
    }
}

/// JSON POST from the allowlisted origin.
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::ORIGIN, ORIGIN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::ORIGIN, ORIGIN)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Parse an SSE body into the JSON payload of each `data:` frame.
pub async fn sse_events(response: Response<Body>) -> Vec<Value> {
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    body.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}
