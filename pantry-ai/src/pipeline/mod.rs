//! Image ingest pipeline
//!
//! resolve → store → classify → normalize, run sequentially for one user
//! action. The result is an unsaved [`ItemCandidate`]; the caller attaches
//! name and quantity and only then writes to the item repository.
//!
//! A run that fails or is cancelled after its image was uploaded removes
//! that image again, so no blob is left without an item.

pub mod classifier;
pub mod error;
pub mod resolver;
pub mod store;

pub use classifier::{ClassificationClient, ImageReference, VisionClassifier};
pub use error::{ClassificationError, PipelineError};
pub use resolver::{resolve, ImageSource, ResolvedImage};
pub use store::{ImageStore, LocalImageStore, StoreError};

use pantry_common::ItemCandidate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Largest image accepted from an upload or downloaded for classification
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Per-run options
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Store the image but do not call the vision backend
    pub skip_classification: bool,
}

/// Capture-to-candidate pipeline
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn ImageStore>,
    classifier: ClassificationClient,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn ImageStore>, classifier: ClassificationClient) -> Self {
        Self { store, classifier }
    }

    pub fn classifier(&self) -> &ClassificationClient {
        &self.classifier
    }

    /// Run the pipeline to completion
    pub async fn run(
        &self,
        source: ImageSource,
        options: CaptureOptions,
    ) -> Result<ItemCandidate, PipelineError> {
        self.run_with_cancel(source, options, &CancellationToken::new())
            .await
    }

    /// Run the pipeline, stopping early when `cancel` fires
    ///
    /// The blob write itself is not interrupted; cancellation is observed
    /// before it and after it, and an image written by a cancelled run is
    /// removed.
    pub async fn run_with_cancel(
        &self,
        source: ImageSource,
        options: CaptureOptions,
        cancel: &CancellationToken,
    ) -> Result<ItemCandidate, PipelineError> {
        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            resolved = resolve(source) => resolved?,
        };

        let (image_url, payload, uploaded) = match resolved {
            ResolvedImage::Url(url) => (url, None, false),
            ResolvedImage::Payload(payload) => {
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                let url = self.store.store(&payload).await?;
                (url, Some(payload), true)
            }
        };

        if cancel.is_cancelled() {
            if uploaded {
                self.discard(&image_url).await;
            }
            return Err(PipelineError::Cancelled);
        }

        if options.skip_classification {
            tracing::info!(url = %image_url, "Classification skipped by caller");
            return Ok(ItemCandidate::unclassified(image_url));
        }

        let image = ImageReference {
            url: image_url.clone(),
            payload,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.classifier.classify(&image) => result.map_err(PipelineError::from),
        };

        match outcome {
            Ok(result) => Ok(ItemCandidate::classified(image_url, result)),
            Err(err) => {
                tracing::warn!(url = %image_url, error = %err, "Ingest pipeline aborted");
                if uploaded {
                    self.discard(&image_url).await;
                }
                Err(err)
            }
        }
    }

    /// Best-effort removal of an image that will never back an item
    async fn discard(&self, url: &str) {
        if let Err(e) = self.store.remove(url).await {
            tracing::warn!(url = %url, error = %e, "Failed to remove orphaned image");
        }
    }
}
