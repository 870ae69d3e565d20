//! `GET /api/quote`.

use axum::Json;
use axum::extract::State;
use halterra_core::{Quote, quote_or_fallback};

use crate::state::AppState;

/// Always `200`: upstream failure falls back to the quote of the day.
pub async fn random(State(state): State<AppState>) -> Json<Quote> {
    Json(quote_or_fallback(state.inspiration.as_ref()).await)
}
