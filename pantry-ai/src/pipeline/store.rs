//! Image blob storage
//!
//! `ImageStore` persists canonical payloads and hands back a public URL.
//! The local implementation writes into `<data folder>/pantry_images/`,
//! which the HTTP service serves under `/pantry_images`.

use async_trait::async_trait;
use chrono::Utc;
use pantry_common::ImagePayload;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::{retry_with_backoff, RetryPolicy};

/// Key prefix (and served path) for stored images
pub const IMAGE_PREFIX: &str = "pantry_images";

/// Blob store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Blob write failed: {0}")]
    Unavailable(String),

    #[error("URL is not managed by this store: {0}")]
    ForeignUrl(String),
}

/// Durable blob storage for captured images
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist `payload`, returning a publicly retrievable URL
    async fn store(&self, payload: &ImagePayload) -> Result<String, StoreError>;

    /// Delete a previously stored image by its URL
    async fn remove(&self, url: &str) -> Result<(), StoreError>;
}

/// Collision-resistant key: `pantry_images/<timestamp_ms>-<sha256 prefix>-<nonce>.<ext>`
///
/// Every call gets its own object, even for identical bytes in the same
/// millisecond, so removing one run's image never touches another's.
pub fn blob_key(payload: &ImagePayload) -> String {
    let digest = Sha256::digest(&payload.bytes);
    let hash = format!("{:x}", digest);
    format!(
        "{}/{}-{}-{}.{}",
        IMAGE_PREFIX,
        Utc::now().timestamp_millis(),
        &hash[..16],
        Uuid::new_v4().simple(),
        payload.extension()
    )
}

/// Filesystem-backed image store
pub struct LocalImageStore {
    root: PathBuf,
    public_base_url: String,
    retry: RetryPolicy,
}

impl LocalImageStore {
    /// `root` is the data folder; images go under `root/pantry_images`
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// Directory served under `/pantry_images`
    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGE_PREFIX)
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Map a URL we issued back to its on-disk path
    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let key = url
            .strip_prefix(&self.public_base_url)?
            .strip_prefix('/')?;
        let file_name = key.strip_prefix(IMAGE_PREFIX)?.strip_prefix('/')?;

        if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return None;
        }

        Some(self.images_dir().join(file_name))
    }

    async fn write_once(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }

        // Write-then-rename so readers never see a partial image
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", tmp.display(), e)))?;

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Unavailable(format!("{}: {}", path.display(), e)));
        }

        Ok(())
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, payload: &ImagePayload) -> Result<String, StoreError> {
        // Key fixed before the first attempt so retries rewrite the same object
        let key = blob_key(payload);
        let path = self.root.join(&key);

        retry_with_backoff(
            "blob write",
            self.retry,
            |e: &StoreError| matches!(e, StoreError::Unavailable(_)),
            || Self::write_once(&path, &payload.bytes),
        )
        .await?;

        let url = self.url_for(&key);
        tracing::info!(
            key = %key,
            bytes = payload.len(),
            mime_type = %payload.mime_type,
            "Stored image"
        );
        Ok(url)
    }

    async fn remove(&self, url: &str) -> Result<(), StoreError> {
        let path = self
            .path_for_url(url)
            .ok_or_else(|| StoreError::ForeignUrl(url.to_string()))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Removed stored image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Unavailable(format!("{}: {}", path.display(), e))),
        }
    }
}
