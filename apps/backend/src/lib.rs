//! Offline JLPT trainer backend.
//!
//! Startup sequence:
//!   1. Load settings and initialize tracing
//!   2. Connect to PostgreSQL and run migrations
//!   3. Seed meta defaults (first start only) and sweep orphaned sessions
//!   4. Warn about missing Ollama / Piper (non-fatal; the service starts
//!      degraded)
//!   5. Serve until SIGINT/SIGTERM, then close any open study session

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Settings;
use crate::db::Database;
use crate::services::speech::SpeechSynthesizer;
use crate::services::tutor::TutorClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tutor: Arc<TutorClient>,
    pub speech: Arc<SpeechSynthesizer>,
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| settings.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Connecting to PostgreSQL...");
    let db = Database::connect(&settings.database_url).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    seed_meta_defaults(&db, &settings).await?;

    let swept = db.sweep_open_sessions().await?;
    if swept > 0 {
        tracing::info!(count = swept, "closed orphaned study sessions");
    }

    let tutor = TutorClient::new(&settings);
    let speech = SpeechSynthesizer::new(&settings);

    if tutor.health().await {
        tracing::info!(model = tutor.model(), "Ollama OK");
    } else {
        tracing::warn!(
            model = tutor.model(),
            "Ollama is not running or the model is not pulled; the AI tutor will be unavailable"
        );
    }
    if speech.available() {
        tracing::info!("Piper TTS OK");
    } else {
        tracing::warn!("Piper binary or voice model not found; audio will be unavailable");
    }

    let state = AppState {
        db: Arc::new(db),
        tutor: Arc::new(tutor),
        speech: Arc::new(speech),
    };

    let app = router(state.clone());

    let addr = settings.bind_addr();
    tracing::info!("Serving at http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Clean shutdown: no session survives the process.
    tracing::info!("Shutting down, closing open study sessions...");
    state.db.sweep_open_sessions().await?;

    Ok(())
}

/// Build the full application router. Exposed so integration tests can run
/// handlers in-process.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/cards/due", get(routes::cards::due))
        .route("/api/cards/new", get(routes::cards::new_items))
        .route("/api/cards/review", post(routes::cards::review))
        .route("/api/cards/sessions", post(routes::cards::open_session))
        .route(
            "/api/cards/sessions/{id}",
            patch(routes::cards::close_session),
        )
        .route("/api/vocab", get(routes::vocab::list))
        .route("/api/vocab/{id}", get(routes::vocab::get_by_id))
        .route("/api/kanji", get(routes::kanji::list))
        .route("/api/kanji/{character}", get(routes::kanji::get_by_character))
        .route("/api/tutor/chat", post(routes::tutor::chat))
        .route("/api/tts", post(routes::tts::synthesize))
        .route("/api/progress", get(routes::progress::progress))
        .route(
            "/api/settings",
            get(routes::settings::get_all).post(routes::settings::update),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// First-start defaults. Existing values are never overwritten, so a
/// changed NEW_CARDS_PER_DAY env var does not clobber a user edit.
async fn seed_meta_defaults(db: &Database, settings: &Settings) -> anyhow::Result<()> {
    db.seed_meta("jlpt_focus", "N5").await?;
    db.seed_meta(
        "new_cards_per_day",
        &settings.new_cards_per_day.to_string(),
    )
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
