//! Vocabulary browse and detail endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::{ApiError, Result};
use crate::models::{Page, PageQuery, Vocab};
use crate::routes::{checked_limit, checked_page, DEFAULT_PAGE_SIZE};
use crate::AppState;

/// GET /api/vocab
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Vocab>>> {
    let page = checked_page(query.page)?;
    let page_size = checked_limit(query.limit, DEFAULT_PAGE_SIZE)?;

    let (items, total) = state
        .db
        .list_vocab(query.level, query.search.as_deref(), page, page_size)
        .await?;

    Ok(Json(Page {
        items,
        total,
        page,
        page_size,
    }))
}

/// GET /api/vocab/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vocab>> {
    let vocab = state
        .db
        .get_vocab(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("vocabulary item {id} not found")))?;
    Ok(Json(vocab))
}
