//! Flashcard endpoints: due cards, new-card intake, review submission, and
//! study sessions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use srs_core::{Grade, MemoryState};

use crate::clock;
use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::{checked_limit, DEFAULT_LIMIT};
use crate::AppState;

/// GET /api/cards/due
pub async fn due(
    State(state): State<AppState>,
    Query(query): Query<CardsQuery>,
) -> Result<Json<Vec<DueCard>>> {
    let limit = checked_limit(query.limit, DEFAULT_LIMIT)?;
    let today = clock::today();

    let cards = state
        .db
        .due_cards(query.level, query.item_type, limit, today)
        .await?;
    Ok(Json(cards))
}

/// GET /api/cards/new
///
/// Surfaces unseeded items up to what remains of the daily intake cap.
/// Overdue reviews are never rate-limited; the cap applies here only.
pub async fn new_items(
    State(state): State<AppState>,
    Query(query): Query<CardsQuery>,
) -> Result<Json<Vec<StudyItem>>> {
    let limit = checked_limit(query.limit, DEFAULT_LIMIT)?;
    let today = clock::today();

    let cap = state
        .db
        .get_meta("new_cards_per_day")
        .await?
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(20);

    let (day_start, day_end) = clock::day_bounds(today);
    let used = state.db.cards_created_between(day_start, day_end).await?;

    let effective = limit.min((cap - used).max(0));
    if effective == 0 {
        return Ok(Json(Vec::new()));
    }

    let items = state
        .db
        .new_items(query.level, query.item_type, effective)
        .await?;
    Ok(Json(items))
}

/// POST /api/cards/review
///
/// Applies one SM-2 cycle. A first review of an unseen item creates its
/// memory card inside the same transaction that appends the review log row
/// and bumps the session counters.
pub async fn review(
    State(state): State<AppState>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>> {
    let grade = Grade::from_score(payload.score).ok_or_else(|| {
        ApiError::Validation(format!(
            "score must be one of 0, 2, 3 or 5, got {}",
            payload.score
        ))
    })?;

    let today = clock::today();
    let now = Utc::now();

    let existing = state.db.get_card(payload.item_type, payload.item_id).await?;
    let before = match &existing {
        Some(card) => card.memory_state(),
        None => {
            if !state.db.item_exists(payload.item_type, payload.item_id).await? {
                return Err(ApiError::NotFound(format!(
                    "{} item {} not found",
                    payload.item_type.as_str(),
                    payload.item_id
                )));
            }
            MemoryState::initial()
        }
    };

    let scheduled = srs_core::review(&before, grade.score(), today);

    let (card, session) = state
        .db
        .review_transaction(
            existing.map(|c| c.id),
            payload.item_type,
            payload.item_id,
            &scheduled.state,
            scheduled.due,
            grade,
            payload.session_id,
            now,
        )
        .await?;

    Ok(Json(ReviewResponse {
        next_due: card.due_date,
        card: card.to_response(),
        session_correct: session.correct,
        session_incorrect: session.incorrect,
    }))
}

/// POST /api/cards/sessions
pub async fn open_session(State(state): State<AppState>) -> Result<Json<SessionStartResponse>> {
    let session = state.db.open_session(Utc::now()).await?;
    Ok(Json(SessionStartResponse {
        id: session.id,
        started_at: session.started_at,
    }))
}

/// PATCH /api/cards/sessions/{id}
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let found = state.db.close_session(id, Utc::now()).await?;
    if !found {
        return Err(ApiError::NotFound(format!("session {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
