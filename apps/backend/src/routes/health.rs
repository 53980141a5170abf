//! Dependency health endpoint used by setup tooling and the dashboard.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// GET /api/health
///
/// Reports each external dependency separately; the endpoint itself always
/// answers 200 so monitors can distinguish "degraded" from "down".
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = state.db.ping().await.is_ok();
    let ollama_ok = state.tutor.health().await;
    let piper_ok = state.speech.available();

    let schema_version = if db_ok {
        state.db.get_meta("schema_version").await.ok().flatten()
    } else {
        None
    };

    Json(json!({
        "db": status(db_ok),
        "ollama": status(ollama_ok),
        "piper": status(piper_ok),
        "schema_version": schema_version,
        "status": if db_ok && ollama_ok && piper_ok { "ok" } else { "degraded" },
    }))
}

fn status(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "unavailable"
    }
}
