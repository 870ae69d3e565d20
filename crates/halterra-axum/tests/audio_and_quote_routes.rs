//! `/api/audio` and `/api/quote` through the full router.

mod common;

use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use common::{app, body_json, get, post_json};
use halterra_core::testing::{FakeSynthesizer, StaticInspiration};
use halterra_core::Voice;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn audio_is_returned_as_base64() {
    let app = app().build();
    let response = app
        .router
        .oneshot(post_json("/api/audio", &json!({"text": "Rest... here."})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "15");
    let body = body_json(response).await;
    let audio = STANDARD.decode(body["audio"].as_str().unwrap()).unwrap();
    assert_eq!(audio, b"ID3-fake-mp3");
    assert_eq!(app.synthesizer.last_voice(), Some(Voice::Meditation));
}

#[tokio::test]
async fn reflection_guide_selects_the_reflection_voice() {
    let app = app().build();
    let response = app
        .router
        .oneshot(post_json(
            "/api/audio",
            &json!({"text": "What matters today?", "guideType": "reflection"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.synthesizer.last_voice(), Some(Voice::Reflection));
}

#[tokio::test]
async fn audio_without_text_is_rejected() {
    let app = app().build();
    let response = app
        .router
        .oneshot(post_json("/api/audio", &json!({"guideType": "meditation"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Missing text field"})
    );
    assert_eq!(app.synthesizer.calls(), 0);
}

#[tokio::test]
async fn synthesizer_failure_is_a_generic_500() {
    let app = app().synthesizer(FakeSynthesizer::failing()).build();
    let response = app
        .router
        .oneshot(post_json("/api/audio", &json!({"text": "Rest."})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to generate audio"})
    );
    assert_eq!(app.synthesizer.calls(), 1);
}

#[tokio::test]
async fn quote_comes_from_the_inspiration_source() {
    let app = app().build();
    let response = app.router.oneshot(get("/api/quote")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"quote": "Breathe in", "author": "Anon"})
    );
}

#[tokio::test]
async fn quote_falls_back_when_the_source_fails() {
    let app = app().inspiration(StaticInspiration::failing()).build();
    let response = app.router.oneshot(get("/api/quote")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(!body["quote"].as_str().unwrap().is_empty());
    assert!(!body["author"].as_str().unwrap().is_empty());
}
