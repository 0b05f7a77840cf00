//! Capture endpoints
//!
//! Both routes run the ingest pipeline and return an unsaved
//! [`ItemCandidate`]. Nothing is written to the item repository here.
//!
//! - `POST /api/capture` takes `{ "image": <url or data: URL>, "skipClassification": bool }`
//! - `POST /api/capture/upload` takes the raw image as the request body

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Query, State},
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use pantry_common::ItemCandidate;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::method_not_allowed;
use crate::pipeline::{CaptureOptions, ImageSource, IngestPipeline, MAX_IMAGE_BYTES};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub image: String,
    #[serde(default)]
    pub skip_classification: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    #[serde(default)]
    pub skip_classification: bool,
}

/// POST /api/capture
pub async fn capture(
    State(state): State<AppState>,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> ApiResult<Json<ItemCandidate>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let options = CaptureOptions {
        skip_classification: request.skip_classification,
    };

    let candidate = run_detached(
        state.pipeline.clone(),
        ImageSource::from_text(request.image),
        options,
    )
    .await?;

    Ok(Json(candidate))
}

/// POST /api/capture/upload
pub async fn capture_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ItemCandidate>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Request body is empty".to_string()));
    }

    let mime_hint = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

    tracing::debug!(
        bytes = body.len(),
        content_type = ?mime_hint,
        "Received image upload"
    );

    let options = CaptureOptions {
        skip_classification: params.skip_classification,
    };

    let candidate = run_detached(
        state.pipeline.clone(),
        ImageSource::from_bytes(body.to_vec(), mime_hint),
        options,
    )
    .await?;

    Ok(Json(candidate))
}

/// Run the pipeline on its own task
///
/// If the request future is dropped (client went away) the guard fires the
/// token, and the pipeline cleans up whatever it already uploaded.
async fn run_detached(
    pipeline: IngestPipeline,
    source: ImageSource,
    options: CaptureOptions,
) -> ApiResult<ItemCandidate> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let task = tokio::spawn(async move {
        pipeline.run_with_cancel(source, options, &cancel).await
    });

    let outcome = task
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {}", e)));

    guard.disarm();

    Ok(outcome??)
}

/// Build capture routes
pub fn capture_routes() -> Router<AppState> {
    Router::new()
        .route("/api/capture", post(capture).fallback(method_not_allowed))
        .route(
            "/api/capture/upload",
            post(capture_upload).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
}
