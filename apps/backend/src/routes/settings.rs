//! Read and write user configuration in the meta table.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::models::JlptLevel;
use crate::AppState;

/// Keys clients may write. Everything else in meta (e.g. schema_version)
/// is read-only.
const EDITABLE_KEYS: [&str; 2] = ["jlpt_focus", "new_cards_per_day"];

/// GET /api/settings
pub async fn get_all(State(state): State<AppState>) -> Result<Json<BTreeMap<String, String>>> {
    let rows = state.db.all_meta().await?;
    Ok(Json(rows.into_iter().map(|m| (m.key, m.value)).collect()))
}

/// POST /api/settings
///
/// Accepts an object of key→value pairs and updates each editable key,
/// then returns the full settings map.
pub async fn update(
    State(state): State<AppState>,
    Json(payload): Json<BTreeMap<String, Value>>,
) -> Result<Json<BTreeMap<String, String>>> {
    if payload.is_empty() {
        return Err(ApiError::Validation("no settings provided".to_string()));
    }

    for (key, raw) in &payload {
        if !EDITABLE_KEYS.contains(&key.as_str()) {
            return Err(ApiError::Validation(format!(
                "'{key}' is not an editable setting (allowed: {})",
                EDITABLE_KEYS.join(", ")
            )));
        }
        let value = coerce_value(key, raw)?;
        state.db.set_meta(key, &value).await?;
    }

    let rows = state.db.all_meta().await?;
    Ok(Json(rows.into_iter().map(|m| (m.key, m.value)).collect()))
}

/// Turn a JSON value into the stored string form, enforcing the per-key
/// invariants: jlpt_focus is a JLPT level, new_cards_per_day a
/// non-negative integer.
fn coerce_value(key: &str, raw: &Value) -> Result<String> {
    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(ApiError::Validation(format!(
                "'{key}' must be a string or number"
            )))
        }
    };

    match key {
        "jlpt_focus" => {
            JlptLevel::parse(&text).ok_or_else(|| {
                ApiError::Validation(format!(
                    "jlpt_focus must be one of N5, N4, N3, N2, N1, got '{text}'"
                ))
            })?;
        }
        "new_cards_per_day" => {
            text.parse::<u32>().map_err(|_| {
                ApiError::Validation(format!(
                    "new_cards_per_day must be a non-negative integer, got '{text}'"
                ))
            })?;
        }
        _ => {}
    }

    Ok(text)
}
