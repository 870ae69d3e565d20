//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where concrete upstream clients, the quota
//! store and the clock are chosen. Everything downstream sees ports.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use halterra_core::{
    DefaultPromptComposer, InMemoryQuotaStore, InspirationSource, PromptComposer, QuotaPolicies,
    QuotaTracker, ResourceKey, RetryPolicy, SpeechSynthesizer, SystemClock, TextGenerator,
    spawn_sweeper,
};
use halterra_upstream::{
    AnthropicClient, AnthropicConfig, ElevenLabsClient, ElevenLabsConfig, ZenQuotesClient,
    ZenQuotesConfig,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::allowlist::{Allowlist, DEFAULT_ORIGINS};
use crate::routes::create_router;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Exact-match origins admitted by the gate.
    pub allowed_origins: Vec<String>,
    pub quotas: QuotaPolicies,
    /// Period of the expired-window sweep. Zero disables the sweeper.
    pub sweep_interval: Duration,
    pub retry: RetryPolicy,
    /// Longest gap between streamed deltas. `None` waits indefinitely.
    pub stream_idle_timeout: Option<Duration>,
    pub anthropic: AnthropicConfig,
    pub elevenlabs: ElevenLabsConfig,
    pub zenquotes: ZenQuotesConfig,
}

impl ServerConfig {
    /// Production defaults with no API keys.
    pub fn with_defaults() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| (*o).to_string()).collect(),
            quotas: QuotaPolicies::builtin(),
            sweep_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            stream_idle_timeout: Some(Duration::from_secs(90)),
            anthropic: AnthropicConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
            zenquotes: ZenQuotesConfig::default(),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    #[must_use]
    pub fn with_quotas(mut self, quotas: QuotaPolicies) -> Self {
        self.quotas = quotas;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, starting from [`Self::with_defaults`].
    ///
    /// Blank values count as unset. Timeouts and the sweep interval accept
    /// `0` to disable them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::with_defaults();

        if let Some(port) = var("HALTERRA_PORT") {
            config.port = parse("HALTERRA_PORT", &port)?;
        }
        if let Some(bind) = var("HALTERRA_BIND") {
            config.bind = parse("HALTERRA_BIND", &bind)?;
        }
        if let Some(origins) = var("HALTERRA_ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }

        for resource in [
            ResourceKey::generate_text(),
            ResourceKey::synthesize_audio(),
            ResourceKey::quote(),
        ] {
            let prefix = format!(
                "HALTERRA_QUOTA_{}",
                resource.as_str().replace('-', "_").to_uppercase()
            );
            let Some(policy) = config.quotas.get_mut(&resource) else {
                continue;
            };
            let max_name = format!("{prefix}_MAX");
            if let Some(max) = var(&max_name) {
                policy.max_requests = parse(&max_name, &max)?;
            }
            let window_name = format!("{prefix}_WINDOW_SECS");
            if let Some(window) = var(&window_name) {
                policy.window = Duration::from_secs(parse(&window_name, &window)?);
            }
        }

        if let Some(secs) = var("HALTERRA_QUOTA_SWEEP_SECS") {
            config.sweep_interval = Duration::from_secs(parse("HALTERRA_QUOTA_SWEEP_SECS", &secs)?);
        }
        if let Some(attempts) = var("HALTERRA_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse("HALTERRA_RETRY_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(ms) = var("HALTERRA_RETRY_BASE_DELAY_MS") {
            config.retry.base_delay =
                Duration::from_millis(parse("HALTERRA_RETRY_BASE_DELAY_MS", &ms)?);
        }
        if let Some(secs) = var("HALTERRA_UPSTREAM_TIMEOUT_SECS") {
            config.anthropic.timeout =
                optional_secs(parse("HALTERRA_UPSTREAM_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = var("HALTERRA_STREAM_IDLE_TIMEOUT_SECS") {
            config.stream_idle_timeout =
                optional_secs(parse("HALTERRA_STREAM_IDLE_TIMEOUT_SECS", &secs)?);
        }

        config.anthropic.api_key = var("ANTHROPIC_API_KEY");
        if let Some(url) = var("ANTHROPIC_BASE_URL") {
            config.anthropic.base_url = url;
        }
        if let Some(model) = var("ANTHROPIC_MODEL") {
            config.anthropic.model = model;
        }
        config.elevenlabs.api_key = var("ELEVENLABS_API_KEY");
        if let Some(url) = var("ELEVENLABS_BASE_URL") {
            config.elevenlabs.base_url = url;
        }
        if let Some(url) = var("ZENQUOTES_URL") {
            config.zenquotes.url = url;
        }

        Ok(config)
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value for {name}: {value:?}"))
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Application context for the Axum adapter.
///
/// Holds the quota tracker, the upstream ports and the shutdown token that
/// cuts retry waits short.
pub struct AxumContext {
    pub quotas: Arc<QuotaTracker>,
    pub allowlist: Allowlist,
    pub generator: Arc<dyn TextGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub inspiration: Arc<dyn InspirationSource>,
    pub composer: Arc<dyn PromptComposer>,
    pub retry: RetryPolicy,
    pub stream_idle_timeout: Option<Duration>,
    pub shutdown: CancellationToken,
}

/// Wire the real upstream clients, the in-memory quota store and the system
/// clock into an [`AxumContext`].
pub fn bootstrap(config: &ServerConfig) -> Result<AxumContext> {
    let http = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    if config.anthropic.api_key.is_none() {
        warn!("ANTHROPIC_API_KEY is not set; meditation generation will fail");
    }
    if config.elevenlabs.api_key.is_none() {
        warn!("ELEVENLABS_API_KEY is not set; audio synthesis will fail");
    }

    let quotas = Arc::new(QuotaTracker::new(
        config.quotas.clone(),
        Arc::new(InMemoryQuotaStore::new()),
        Arc::new(SystemClock),
    ));

    Ok(AxumContext {
        quotas,
        allowlist: Allowlist::new(config.allowed_origins.iter().cloned()),
        generator: Arc::new(AnthropicClient::new(http.clone(), config.anthropic.clone())),
        synthesizer: Arc::new(ElevenLabsClient::new(http.clone(), config.elevenlabs.clone())),
        inspiration: Arc::new(ZenQuotesClient::new(http, config.zenquotes.clone())),
        composer: Arc::new(DefaultPromptComposer::default()),
        retry: config.retry,
        stream_idle_timeout: config.stream_idle_timeout,
        shutdown: CancellationToken::new(),
    })
}

/// Start the web server and run until Ctrl-C.
///
/// Shutdown cancels pending retry waits and stops the quota sweeper.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let ctx = bootstrap(&config)?;
    let shutdown = ctx.shutdown.clone();

    let sweeper = if config.sweep_interval.is_zero() {
        info!("Quota sweeper disabled");
        None
    } else {
        Some(spawn_sweeper(
            Arc::clone(&ctx.quotas),
            config.sweep_interval,
            shutdown.clone(),
        ))
    };

    let app = create_router(ctx);
    let addr = SocketAddr::new(config.bind, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        origins = config.allowed_origins.len(),
        retry_attempts = config.retry.max_attempts,
        "halterra listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await
    .context("Server error")?;

    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            warn!(error = %e, "Quota sweeper task failed");
        }
    }
    info!("halterra stopped");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl-C; waiting for cancellation");
                token.cancelled().await;
            }
        },
        () = token.cancelled() => {}
    }
    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.allowed_origins.len(), DEFAULT_ORIGINS.len());
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(2000));
        assert_eq!(config.anthropic.timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.stream_idle_timeout, Some(Duration::from_secs(90)));
        assert!(config.anthropic.api_key.is_none());
    }

    #[test]
    fn environment_overrides() {
        let config = config(&[
            ("HALTERRA_PORT", "8080"),
            ("HALTERRA_BIND", "127.0.0.1"),
            ("HALTERRA_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("HALTERRA_QUOTA_GENERATE_TEXT_MAX", "2"),
            ("HALTERRA_QUOTA_QUOTE_WINDOW_SECS", "30"),
            ("HALTERRA_RETRY_MAX_ATTEMPTS", "5"),
            ("HALTERRA_UPSTREAM_TIMEOUT_SECS", "0"),
            ("HALTERRA_STREAM_IDLE_TIMEOUT_SECS", "0"),
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("ZENQUOTES_URL", "http://localhost:1/quote"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        let text = config.quotas.get(&ResourceKey::generate_text()).unwrap();
        assert_eq!(text.max_requests, 2);
        let quote = config.quotas.get(&ResourceKey::quote()).unwrap();
        assert_eq!(quote.window, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.anthropic.timeout, None);
        assert_eq!(config.stream_idle_timeout, None);
        assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.zenquotes.url, "http://localhost:1/quote");
    }

    #[test]
    fn invalid_value_names_the_variable() {
        let err = config(&[("HALTERRA_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("HALTERRA_PORT"));
    }

    #[test]
    fn blank_key_counts_as_unset() {
        let config = config(&[("ELEVENLABS_API_KEY", "   ")]).unwrap();
        assert!(config.elevenlabs.api_key.is_none());
    }

    #[tokio::test]
    async fn bootstrap_builds_context_without_keys() {
        let ctx = bootstrap(&ServerConfig::with_defaults()).unwrap();
        assert_eq!(ctx.allowlist.len(), DEFAULT_ORIGINS.len());
        assert_eq!(ctx.stream_idle_timeout, Some(Duration::from_secs(90)));
        assert!(!ctx.shutdown.is_cancelled());
    }
}
