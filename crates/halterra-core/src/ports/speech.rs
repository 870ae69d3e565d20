use async_trait::async_trait;
use bytes::Bytes;

use super::UpstreamError;
use crate::domain::Voice;

/// Speech-synthesis port: text in, encoded audio out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Bytes, UpstreamError>;
}
