//! AI tutor SSE endpoint.
//!
//! POST /api/tutor/chat with `{message, mode}` answers with
//! `text/event-stream`: one `data:` frame per generated token, a JSON error
//! frame on failure, and a terminal `data: [DONE]` frame either way.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{ApiError, Result};
use crate::services::tutor::{build_system_prompt, TutorContext, TutorFrame, TutorMode};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TutorChatRequest {
    pub message: String,
    pub mode: TutorMode,
}

/// POST /api/tutor/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<TutorChatRequest>,
) -> Result<impl IntoResponse> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }

    // Three independent context reads, merged before streaming begins.
    let (focus, recent_words, weak_words) = tokio::try_join!(
        state.db.get_meta("jlpt_focus"),
        state.db.recent_review_words(10),
        state.db.weakest_card_words(5),
    )?;

    let ctx = TutorContext {
        jlpt_level: focus.unwrap_or_else(|| "N5".to_string()),
        recent_words,
        weak_words,
    };
    let system = build_system_prompt(payload.mode, &ctx);

    let rx = state.tutor.stream_generate(system, payload.message);

    let stream = ReceiverStream::new(rx)
        .map(|frame| match frame {
            TutorFrame::Token(token) => Event::default().data(token),
            TutorFrame::Error(code) => {
                Event::default().data(serde_json::json!({ "error": code }).to_string())
            }
        })
        .chain(stream::once(async { Event::default().data("[DONE]") }))
        .map(Ok::<_, Infallible>);

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    Ok((
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))],
        sse,
    ))
}
