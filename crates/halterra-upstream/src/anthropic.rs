use std::time::Duration;

use async_trait::async_trait;
use halterra_core::{DeltaStream, GenerationRequest, TextGenerator, UpstreamError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{from_reqwest, from_status};
use crate::sse::text_deltas;

const SERVICE: &str = "text-generation";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// `None` leaves the client unconfigured; every call then fails.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Bound on one non-streaming call. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// [`TextGenerator`] backed by the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub const fn new(http: reqwest::Client, config: AnthropicConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn build(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> Result<reqwest::RequestBuilder, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::configuration(SERVICE, "ANTHROPIC_API_KEY is not set"))?;

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            stream,
        };

        Ok(self
            .http
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body))
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, UpstreamError> {
        let limit = self.config.timeout;
        let mut builder = self.build(request, false)?;
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| from_reqwest(SERVICE, &e, limit))?;

        if !response.status().is_success() {
            return Err(from_status(SERVICE, response).await);
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| from_reqwest(SERVICE, &e, limit))?;

        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        debug!(model = %self.config.model, chars = text.len(), "Generation complete");
        Ok(text)
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<DeltaStream, UpstreamError> {
        // The session's idle bound replaces a whole-request timeout here.
        let response = self
            .build(request, true)?
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| from_reqwest(SERVICE, &e, None))?;

        if !response.status().is_success() {
            return Err(from_status(SERVICE, response).await);
        }

        debug!(model = %self.config.model, "Generation stream opened");
        Ok(text_deltas(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = MessagesRequest {
            model: "m",
            max_tokens: 4000,
            temperature: 0.5,
            system: "sys",
            messages: [Message {
                role: "user",
                content: "hi",
            }],
            stream: true,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "m",
                "max_tokens": 4000,
                "temperature": 0.5,
                "system": "sys",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })
        );
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let client = AnthropicClient::new(reqwest::Client::new(), AnthropicConfig::default());
        let request = GenerationRequest {
            system: String::new(),
            prompt: String::new(),
            max_tokens: 1,
            temperature: 0.0,
        };
        let err = client.complete(&request).await.unwrap_err();
        assert_eq!(err.kind, halterra_core::UpstreamErrorKind::Configuration);
        assert!(!err.is_transient());
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = AnthropicClient::new(
            reqwest::Client::new(),
            AnthropicConfig {
                base_url: "http://localhost:9/".into(),
                ..AnthropicConfig::default()
            },
        );
        assert_eq!(client.endpoint(), "http://localhost:9/v1/messages");
    }
}
