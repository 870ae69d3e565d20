//! Text-generation port.
//!
//! The generator is the expensive, flaky collaborator the whole pipeline is
//! built around. It is consumed in two shapes: one completed text (retried
//! on transient failure) or an incremental delta stream (never retried).

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Serialize;

use super::UpstreamError;

/// Incremental text deltas in arrival order.
///
/// An `Err` item means the stream broke before completion; consumers stop
/// at the first error.
pub type DeltaStream = BoxStream<'static, Result<String, UpstreamError>>;

/// A single generation call: system instruction plus user prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run the generation to completion and return the full text.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, UpstreamError>;

    /// Start a streaming generation.
    ///
    /// Errors returned here happen before any delta was produced.
    async fn stream(&self, request: &GenerationRequest) -> Result<DeltaStream, UpstreamError>;
}
