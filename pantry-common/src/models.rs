//! Pantry data model
//!
//! `PantryItem` is the persisted record. Everything else here is transient:
//! `ImagePayload` lives for one capture-to-upload operation,
//! `ClassificationResult` for one classification call, and `ItemCandidate`
//! until the caller supplies a name and quantity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::tags::{normalize, normalize_tags};
use crate::{Error, Result};

/// Persisted pantry item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    /// Opaque identifier assigned by the repository
    pub id: String,
    pub name: String,
    /// Numeric string, e.g. "2" or "0.5"
    pub quantity: String,
    /// Dereferenceable image URL
    pub image_url: String,
    /// Ordered tags, at most [`crate::MAX_TAGS`]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item fields supplied by a caller for create or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,
    pub quantity: String,
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ItemDraft {
    /// Build a draft from a pipeline candidate plus the caller's fields
    pub fn from_candidate(
        candidate: ItemCandidate,
        name: impl Into<String>,
        quantity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            image_url: candidate.image_url,
            tags: candidate.tags,
        }
    }

    /// Validate and normalize the draft before it reaches the repository
    ///
    /// Trims name and quantity, re-applies tag normalization, and rejects
    /// blank names, non-numeric or negative quantities, and image
    /// references that are not http(s) URLs (inline `data:` payloads must
    /// be uploaded first).
    pub fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("Item name is required".to_string()));
        }

        let quantity = self.quantity.trim().to_string();
        match quantity.parse::<f64>() {
            Ok(q) if q.is_finite() && q >= 0.0 => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Quantity must be a non-negative number, got '{}'",
                    quantity
                )))
            }
        }

        let image_url = self.image_url.trim().to_string();
        if !is_http_url(&image_url) {
            return Err(Error::InvalidInput(
                "Image URL must be an http(s) URL".to_string(),
            ));
        }

        Ok(Self {
            name,
            quantity,
            image_url,
            tags: normalize_tags(&self.tags),
        })
    }
}

/// Canonical image bytes plus content type, ready for upload
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// File extension used for blob keys
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            "image/heic" => "heic",
            "image/heif" => "heif",
            "image/avif" => "avif",
            "image/tiff" => "tiff",
            _ => "bin",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Output of one classification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Model answer as received
    pub raw_text: String,
    /// Normalized tags derived from `raw_text`
    pub tags: Vec<String>,
}

impl ClassificationResult {
    pub fn from_raw(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let tags = normalize(&raw_text);
        Self { raw_text, tags }
    }
}

/// Unsaved item produced by the ingest pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCandidate {
    pub image_url: String,
    pub tags: Vec<String>,
    /// First tag, offered as a default item name
    pub suggested_name: Option<String>,
    /// False when classification was explicitly skipped
    pub classified: bool,
}

impl ItemCandidate {
    pub fn classified(image_url: String, result: ClassificationResult) -> Self {
        Self {
            image_url,
            suggested_name: result.tags.first().cloned(),
            tags: result.tags,
            classified: true,
        }
    }

    pub fn unclassified(image_url: String) -> Self {
        Self {
            image_url,
            tags: Vec::new(),
            suggested_name: None,
            classified: false,
        }
    }
}

/// True for absolute http(s) URLs with a non-empty host
///
/// Raw whitespace is refused even though the parser would percent-encode it.
pub fn is_http_url(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }

    match Url::parse(s) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}
