//! Shared test infrastructure for integration tests.
//!
//! # Requirements
//! Database-backed tests need PostgreSQL (set DATABASE_URL) and are marked
//! `#[ignore = "requires database"]`. They truncate the study tables on
//! setup, so run them against a throwaway database with --test-threads=1.

pub mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;

use jlpt_trainer_backend::db::Database;
use jlpt_trainer_backend::services::speech::SpeechSynthesizer;
use jlpt_trainer_backend::services::tutor::TutorClient;
use jlpt_trainer_backend::{router, AppState};

/// Test context wrapping a real database connection and the full router.
pub struct TestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl TestContext {
    /// Connect, migrate, and reset study state. Panics when DATABASE_URL is
    /// missing or the database is unreachable.
    pub async fn new() -> Self {
        Self::with_tutor_endpoint("http://127.0.0.1:9", "test-model").await
    }

    /// Same as `new` but pointing the tutor gateway at a caller-supplied
    /// (usually mock) Ollama endpoint.
    pub async fn with_tutor_endpoint(ollama_url: &str, model: &str) -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&database_url)
            .await
            .expect("failed to connect to test database");
        db.run_migrations().await.expect("failed to run migrations");

        reset_tables(&db).await;

        let db = Arc::new(db);
        let state = AppState {
            db: db.clone(),
            tutor: Arc::new(TutorClient::with_endpoint(ollama_url, model)),
            speech: Arc::new(SpeechSynthesizer::with_paths(
                PathBuf::from("/nonexistent/piper"),
                PathBuf::from("/nonexistent/voice.onnx"),
            )),
        };

        let app = router(state);
        Self { db, app }
    }

    /// Router clone for axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Open a study session directly against the store.
    pub async fn open_session(&self) -> i64 {
        self.db
            .open_session(chrono::Utc::now())
            .await
            .expect("failed to open session")
            .id
    }
}

/// Wipe study state and reseed the editable meta defaults.
async fn reset_tables(db: &Database) {
    sqlx::query(
        "TRUNCATE review_log, study_sessions, srs_cards, vocab, kanji RESTART IDENTITY CASCADE",
    )
    .execute(db.pool())
    .await
    .expect("failed to truncate test tables");

    db.set_meta("jlpt_focus", "N5").await.unwrap();
    db.set_meta("new_cards_per_day", "20").await.unwrap();
}
