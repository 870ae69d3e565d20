use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use halterra_core::{SpeechSynthesizer, UpstreamError, Voice};
use serde::Serialize;
use tracing::debug;

use crate::http::{from_reqwest, from_status};

const SERVICE: &str = "speech-synthesis";
const MODEL_ID: &str = "eleven_v3";
const OUTPUT_FORMAT: &str = "mp3_44100_192";

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.elevenlabs.io".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    speed: f32,
    use_speaker_boost: bool,
}

/// Voice id and tuning for each narrator.
const fn voice_profile(voice: Voice) -> (&'static str, VoiceSettings) {
    match voice {
        Voice::Meditation => (
            "xsNzdCmWJpYoa80FaXJi",
            VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.90,
                style: 0.0,
                speed: 0.75,
                use_speaker_boost: true,
            },
        ),
        Voice::Reflection => (
            "93nuHbke4dTER9x2pDwE",
            VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.85,
                style: 0.0,
                speed: 0.85,
                use_speaker_boost: true,
            },
        ),
    }
}

/// Add v3 delivery tags: a breath after each ellipsis and between
/// paragraphs, plus an opening tone tag per narrator.
fn prepare_narration(text: &str, voice: Voice) -> String {
    let primer = match voice {
        Voice::Meditation => "[softly]",
        Voice::Reflection => "[warmly]",
    };

    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.replace("...", "... [breath]"))
        .map(|p| p.trim_end_matches(" [breath]").to_string())
        .collect();

    format!("{primer} {}", paragraphs.join("\n\n[breath]\n\n"))
        .trim()
        .to_string()
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: VoiceSettings,
    output_format: &'static str,
}

/// [`SpeechSynthesizer`] backed by ElevenLabs text-to-speech. Returns MP3 bytes.
pub struct ElevenLabsClient {
    http: reqwest::Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsClient {
    pub const fn new(http: reqwest::Client, config: ElevenLabsConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Bytes, UpstreamError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| UpstreamError::configuration(SERVICE, "ELEVENLABS_API_KEY is not set"))?;

        let (voice_id, voice_settings) = voice_profile(voice);
        let script = prepare_narration(text, voice);
        let url = format!(
            "{}/v1/text-to-speech/{voice_id}",
            self.config.base_url.trim_end_matches('/')
        );
        let limit = self.config.timeout;

        debug!(?voice, chars = text.chars().count(), "Requesting speech synthesis");

        let response = self
            .http
            .post(url)
            .header("xi-api-key", api_key)
            .header("accept", "audio/mpeg")
            .json(&SpeechRequest {
                text: &script,
                model_id: MODEL_ID,
                voice_settings,
                output_format: OUTPUT_FORMAT,
            })
            .timeout(limit)
            .send()
            .await
            .map_err(|e| from_reqwest(SERVICE, &e, Some(limit)))?;

        if !response.status().is_success() {
            return Err(from_status(SERVICE, response).await);
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| from_reqwest(SERVICE, &e, Some(limit)))?;

        debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrators_have_distinct_voices() {
        let (meditation, slow) = voice_profile(Voice::Meditation);
        let (reflection, brisk) = voice_profile(Voice::Reflection);
        assert_ne!(meditation, reflection);
        assert!(slow.speed < brisk.speed);
    }

    #[test]
    fn narration_gets_breaths_and_primer() {
        let script = prepare_narration("Breathe in...\n\n\n\nAnd out...", Voice::Meditation);
        assert_eq!(
            script,
            "[softly] Breathe in...\n\n[breath]\n\nAnd out..."
        );

        let mid = prepare_narration("Pause... then rest.", Voice::Reflection);
        assert_eq!(mid, "[warmly] Pause... [breath] then rest.");
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let client = ElevenLabsClient::new(reqwest::Client::new(), ElevenLabsConfig::default());
        let err = client.synthesize("breathe", Voice::Meditation).await.unwrap_err();
        assert_eq!(err.kind, halterra_core::UpstreamErrorKind::Configuration);
    }
}
