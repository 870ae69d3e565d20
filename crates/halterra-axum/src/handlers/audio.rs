//! `POST /api/audio`: narration text to base64 MP3.

use axum::Json;
use axum::extract::State;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use halterra_core::{GuideType, Voice};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{non_blank, parse_body};
use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub guide_type: GuideType,
}

#[derive(Debug, Serialize)]
pub struct AudioResponse {
    /// Base64 (standard alphabet) MP3 bytes.
    pub audio: String,
}

pub async fn synthesize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AudioResponse>, HttpError> {
    let request: AudioRequest = parse_body(&body)?;
    let text = non_blank(request.text)
        .ok_or_else(|| HttpError::Validation("Missing text field".to_string()))?;
    let voice = Voice::from(request.guide_type);

    let audio = state
        .synthesizer
        .synthesize(&text, voice)
        .await
        .map_err(|e| HttpError::upstream("Failed to generate audio", e))?;

    info!(
        voice = ?voice,
        text_len = text.len(),
        audio_bytes = audio.len(),
        "Audio synthesized"
    );

    Ok(Json(AudioResponse {
        audio: STANDARD.encode(&audio),
    }))
}
