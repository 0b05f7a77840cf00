//! Pantry item CRUD endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use pantry_common::search::filter_items;
use pantry_common::{ItemDraft, PantryItem};
use serde::Deserialize;

use super::method_not_allowed;
use crate::{ApiError, ApiResult, AppState};

/// Query parameters for GET /api/items
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Case-insensitive substring matched against name and tags
    pub q: Option<String>,
}

fn parse_draft(payload: Result<Json<ItemDraft>, JsonRejection>) -> ApiResult<ItemDraft> {
    payload
        .map(|Json(draft)| draft)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// GET /api/items
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<PantryItem>>> {
    let items = state.items.list().await?;
    let items = filter_items(items, params.q.as_deref());

    tracing::debug!(count = items.len(), query = ?params.q, "Listed pantry items");

    Ok(Json(items))
}

/// POST /api/items
pub async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<ItemDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PantryItem>)> {
    let draft = parse_draft(payload)?;
    let item = state.items.create(&draft).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/items/:id
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PantryItem>> {
    state
        .items
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Pantry item {}", id)))
}

/// PUT /api/items/:id
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ItemDraft>, JsonRejection>,
) -> ApiResult<Json<PantryItem>> {
    let draft = parse_draft(payload)?;
    let item = state.items.update(&id, &draft).await?;

    Ok(Json(item))
}

/// DELETE /api/items/:id
///
/// The item's image is left in place.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.items.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build item routes
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/items",
            get(list_items)
                .post(create_item)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/items/:id",
            get(get_item)
                .put(update_item)
                .delete(delete_item)
                .fallback(method_not_allowed),
        )
}
