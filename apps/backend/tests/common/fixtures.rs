//! Row builders for integration tests.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};

use jlpt_trainer_backend::db::Database;
use jlpt_trainer_backend::models::ItemType;

/// Insert one vocabulary row and return its id.
pub async fn insert_vocab(
    db: &Database,
    word: &str,
    reading: &str,
    meaning: &str,
    level: &str,
) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO vocab (word, reading, meaning, part_of_speech, jlpt_level)
        VALUES ($1, $2, $3, 'verb', $4::jlpt_level)
        RETURNING id
        "#,
    )
    .bind(word)
    .bind(reading)
    .bind(meaning)
    .bind(level)
    .fetch_one(db.pool())
    .await
    .expect("failed to insert vocab fixture")
}

/// Insert one kanji row and return its id.
pub async fn insert_kanji(db: &Database, character: &str, level: &str, freq_rank: i32) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO kanji ("character", on_yomi, kun_yomi, meaning, stroke_count,
                           jlpt_level, freq_rank)
        VALUES ($1, '{"ニチ"}', '{"ひ"}', '{"day"}', 4, $2::jlpt_level, $3)
        RETURNING id
        "#,
    )
    .bind(character)
    .bind(level)
    .bind(freq_rank)
    .fetch_one(db.pool())
    .await
    .expect("failed to insert kanji fixture")
}

/// Insert a memory card with explicit state and return its id.
#[allow(clippy::too_many_arguments)]
pub async fn insert_card(
    db: &Database,
    item_type: ItemType,
    item_id: i64,
    ease: f64,
    interval: i32,
    reps: i32,
    due: NaiveDate,
    created_at: DateTime<Utc>,
) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO srs_cards (item_type, item_id, ease_factor, interval_days,
                               reps, due_date, last_reviewed, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING id
        "#,
    )
    .bind(item_type)
    .bind(item_id)
    .bind(ease)
    .bind(interval)
    .bind(reps)
    .bind(due)
    .bind(created_at)
    .fetch_one(db.pool())
    .await
    .expect("failed to insert card fixture")
}

/// Append a review log row directly (for aggregation tests).
pub async fn insert_review(
    db: &Database,
    session_id: i64,
    card_id: i64,
    grade: i32,
    reviewed_at: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO review_log (session_id, card_id, grade, reviewed_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(session_id)
    .bind(card_id)
    .bind(grade)
    .bind(reviewed_at)
    .execute(db.pool())
    .await
    .expect("failed to insert review fixture");
}

/// Body for POST /api/cards/review.
pub fn review_request(item_type: &str, item_id: i64, score: i64, session_id: i64) -> Value {
    json!({
        "item_type": item_type,
        "item_id": item_id,
        "score": score,
        "session_id": session_id,
    })
}
