//! Stateless classification endpoint
//!
//! `POST /api/classify-image` with `{ "imageUrl": "..." }` returns
//! `{ "tags": [...] }`. Nothing is stored.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::method_not_allowed;
use crate::pipeline::resolver::{is_inline_data, resolve, ImageSource, ResolvedImage};
use crate::pipeline::ImageReference;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub tags: Vec<String>,
}

/// POST /api/classify-image
pub async fn classify_image(
    State(state): State<AppState>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> ApiResult<Json<ClassifyResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let image_url = request
        .image_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Image URL is required".to_string()))?;

    // Inline data is decoded here so inline adapters get the bytes directly
    let image = if is_inline_data(&image_url) {
        match resolve(ImageSource::InlineData(image_url.clone())).await? {
            ResolvedImage::Payload(payload) => ImageReference::with_payload(image_url, payload),
            ResolvedImage::Url(url) => ImageReference::url(url),
        }
    } else {
        ImageReference::url(image_url)
    };

    let result = state.pipeline.classifier().classify(&image).await?;

    Ok(Json(ClassifyResponse { tags: result.tags }))
}

/// Build classification routes
pub fn classify_routes() -> Router<AppState> {
    Router::new().route(
        "/api/classify-image",
        post(classify_image).fallback(method_not_allowed),
    )
}
