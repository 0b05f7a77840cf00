//! HTTP API handlers for pantry-ai

pub mod capture;
pub mod classify;
pub mod health;
pub mod items;

pub use capture::capture_routes;
pub use classify::classify_routes;
pub use health::health_routes;
pub use items::item_routes;

use crate::ApiError;

/// Fallback for routes hit with an unsupported method
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
