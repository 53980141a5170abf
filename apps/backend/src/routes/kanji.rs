//! Kanji browse and detail endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::{ApiError, Result};
use crate::models::{Kanji, Page, PageQuery};
use crate::routes::{checked_limit, checked_page, DEFAULT_PAGE_SIZE};
use crate::AppState;

/// GET /api/kanji
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Kanji>>> {
    let page = checked_page(query.page)?;
    let page_size = checked_limit(query.limit, DEFAULT_PAGE_SIZE)?;

    let (items, total) = state
        .db
        .list_kanji(query.level, query.search.as_deref(), page, page_size)
        .await?;

    Ok(Json(Page {
        items,
        total,
        page,
        page_size,
    }))
}

/// GET /api/kanji/{character}
pub async fn get_by_character(
    State(state): State<AppState>,
    Path(character): Path<String>,
) -> Result<Json<Kanji>> {
    if character.chars().count() != 1 {
        return Err(ApiError::Validation(
            "path parameter must be a single kanji character (e.g. 日)".to_string(),
        ));
    }

    let kanji = state
        .db
        .get_kanji(&character)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("kanji '{character}' not found")))?;
    Ok(Json(kanji))
}
