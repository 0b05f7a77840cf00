//! # Pantry Common Library
//!
//! Shared code for the pantry services including:
//! - Item data model (`PantryItem`, drafts, candidates, image payloads)
//! - Tag normalization for free-text model output
//! - Item search filtering
//! - Configuration loading (TOML bootstrap + environment)
//! - Common error type

pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod tags;

pub use error::{Error, Result};
pub use models::{ClassificationResult, ImagePayload, ItemCandidate, ItemDraft, PantryItem};
pub use tags::{normalize, normalize_tags, MAX_TAGS};
