//! pantry-ai library interface
//!
//! Image ingest and classification service for the pantry inventory.
//! Exposes the pipeline, repository and router for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::db::ItemRepository;
use crate::pipeline::IngestPipeline;

/// Application state shared across handlers
///
/// Built once at startup; every dependency is shared read-only.
#[derive(Clone)]
pub struct AppState {
    /// Resolve → store → classify pipeline
    pub pipeline: IngestPipeline,
    /// Item persistence
    pub items: Arc<dyn ItemRepository>,
    /// Directory served under `/pantry_images`
    pub images_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        pipeline: IngestPipeline,
        items: Arc<dyn ItemRepository>,
        images_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            items,
            images_dir: images_dir.into(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let images = ServeDir::new(&state.images_dir);

    Router::new()
        .merge(api::classify_routes())
        .merge(api::capture_routes())
        .merge(api::item_routes())
        .merge(api::health_routes())
        .nest_service(&format!("/{}", pipeline::store::IMAGE_PREFIX), images)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
