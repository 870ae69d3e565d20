use std::time::Duration;

use async_trait::async_trait;
use halterra_core::{InspirationSource, Quote, UpstreamError};
use serde::Deserialize;

use crate::http::{from_reqwest, from_status};

const SERVICE: &str = "inspiration";
const USER_AGENT: &str = "Halterra-Meditation-App/1.0";

#[derive(Debug, Clone)]
pub struct ZenQuotesConfig {
    /// Full URL of the random-quote endpoint.
    pub url: String,
    pub timeout: Duration,
}

impl Default for ZenQuotesConfig {
    fn default() -> Self {
        Self {
            url: "https://zenquotes.io/api/random".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZenQuote {
    q: String,
    a: String,
}

/// [`InspirationSource`] backed by the ZenQuotes random endpoint.
pub struct ZenQuotesClient {
    http: reqwest::Client,
    config: ZenQuotesConfig,
}

impl ZenQuotesClient {
    pub const fn new(http: reqwest::Client, config: ZenQuotesConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl InspirationSource for ZenQuotesClient {
    async fn random_quote(&self) -> Result<Quote, UpstreamError> {
        let limit = self.config.timeout;
        let response = self
            .http
            .get(&self.config.url)
            .header("user-agent", USER_AGENT)
            .timeout(limit)
            .send()
            .await
            .map_err(|e| from_reqwest(SERVICE, &e, Some(limit)))?;

        if !response.status().is_success() {
            return Err(from_status(SERVICE, response).await);
        }

        let quotes: Vec<ZenQuote> = response
            .json()
            .await
            .map_err(|e| from_reqwest(SERVICE, &e, Some(limit)))?;

        quotes
            .into_iter()
            .find(|z| !z.q.trim().is_empty() && !z.a.trim().is_empty())
            .map(|z| Quote::new(z.q.trim(), z.a.trim()))
            .ok_or_else(|| UpstreamError::decode(SERVICE, "no quote in response"))
    }
}
