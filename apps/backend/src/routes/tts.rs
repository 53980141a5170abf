//! Offline text-to-speech endpoint.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
}

/// POST /api/tts
///
/// Returns raw WAV bytes suitable for `new Audio(URL.createObjectURL(blob))`
/// in the frontend. Never cached; every request synthesizes fresh.
pub async fn synthesize(
    State(state): State<AppState>,
    Json(payload): Json<TtsRequest>,
) -> Result<impl IntoResponse> {
    let wav = state
        .speech
        .synthesize(&payload.text)
        .await
        .map_err(ApiError::from)?;

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static("audio/wav"))],
        wav,
    ))
}
