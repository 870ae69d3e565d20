//! `POST /api/meditation`: one generated session, streamed or whole.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream;
use halterra_core::{
    GuideType, MeditationBrief, Mood, OutputContract, SessionOptions, StreamEvent,
    UpstreamError, call_with_retry, quote_or_fallback, reassemble_combined, reassemble_stream,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};
use uuid::Uuid;

use super::{non_blank, parse_body};
use crate::error::HttpError;
use crate::sse::session_response;
use crate::state::AppState;

const MISSING_FIELDS: &str = "Missing required fields";
const GENERATION_FAILED: &str = "Failed to generate meditation";

const fn default_duration() -> u32 {
    4
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationRequest {
    pub user_name: Option<String>,
    pub mood: Option<Mood>,
    pub category: Option<String>,
    pub intention: Option<String>,
    #[serde(default)]
    pub guide_type: GuideType,
    #[serde(default = "default_duration")]
    pub duration: u32,
    pub astrological_profile: Option<Value>,
    #[serde(default)]
    pub stream: bool,
}

impl MeditationRequest {
    fn into_brief(self) -> Result<MeditationBrief, HttpError> {
        let mood = self.mood.filter(|m| !m.name.trim().is_empty());
        let (Some(user_name), Some(mood), Some(category), Some(intention)) = (
            non_blank(self.user_name),
            mood,
            non_blank(self.category),
            non_blank(self.intention),
        ) else {
            return Err(HttpError::Validation(MISSING_FIELDS.to_string()));
        };

        Ok(MeditationBrief {
            user_name,
            mood,
            category,
            intention,
            guide_type: self.guide_type,
            duration_minutes: self.duration,
            profile: self.astrological_profile,
            inspiration: None,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationResponse {
    pub meditation_text: String,
    pub audio_text: String,
    pub daily_inspiration: String,
}

pub async fn generate(State(state): State<AppState>, body: Bytes) -> Result<Response, HttpError> {
    let request: MeditationRequest = parse_body(&body)?;
    let streaming = request.stream;
    let brief = request.into_brief()?;

    let inspiration = quote_or_fallback(state.inspiration.as_ref())
        .await
        .to_string();
    let brief = brief.with_inspiration(inspiration.clone());

    if streaming {
        Ok(open_session(&state, &brief, inspiration).await)
    } else {
        generate_whole(&state, &brief, inspiration).await
    }
}

async fn open_session(state: &AppState, brief: &MeditationBrief, inspiration: String) -> Response {
    let session_id = Uuid::new_v4();
    let generation = state.composer.compose(brief, OutputContract::LineDelimited);

    // The idle bound also covers the wait for the stream to open.
    let opening = state.generator.stream(&generation);
    let opened = match state.stream_idle_timeout {
        Some(limit) => tokio::time::timeout(limit, opening)
            .await
            .unwrap_or_else(|_| Err(UpstreamError::timeout("text-generation", limit))),
        None => opening.await,
    };

    let upstream = match opened {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(%session_id, error = %e, "Failed to open generation stream");
            return session_response(stream::iter([StreamEvent::failed()]));
        }
    };

    info!(
        %session_id,
        guide = brief.guide_type.as_str(),
        duration = brief.duration_minutes,
        "Streaming session opened"
    );

    let mut metadata = Map::new();
    metadata.insert("dailyInspiration".to_string(), Value::String(inspiration));
    let events = reassemble_stream(
        upstream,
        SessionOptions {
            idle_timeout: state.stream_idle_timeout,
            metadata,
        },
    );
    session_response(events)
}

async fn generate_whole(
    state: &AppState,
    brief: &MeditationBrief,
    inspiration: String,
) -> Result<Response, HttpError> {
    let generation = state.composer.compose(brief, OutputContract::CombinedRecord);

    let text = call_with_retry(&state.retry, &state.shutdown, || {
        state.generator.complete(&generation)
    })
    .await
    .map_err(|e| HttpError::upstream(GENERATION_FAILED, e))?;

    let artifacts = reassemble_combined(&text);
    info!(
        guide = brief.guide_type.as_str(),
        display_len = artifacts.display.len(),
        narration_len = artifacts.narration.len(),
        "Meditation generated"
    );

    Ok(Json(MeditationResponse {
        meditation_text: artifacts.display,
        audio_text: artifacts.narration,
        daily_inspiration: inspiration,
    })
    .into_response())
}
