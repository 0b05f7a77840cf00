//! Pipeline error taxonomy
//!
//! Each stage either recovers with a defined fallback (tag normalization
//! degrades to an empty list) or returns one of these typed errors.

use std::time::Duration;
use thiserror::Error;

use super::store::StoreError;

/// Vision backend failure
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Classification timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    /// Inline adapters must fetch the image first; `status` is None when
    /// no HTTP response was received
    #[error("Image fetch failed: {message}")]
    ImageFetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Image exceeds {limit} bytes")]
    ImageTooLarge { limit: usize },
}

impl ClassificationError {
    /// Network failures, timeouts, rate limiting and 5xx are worth retrying;
    /// other statuses, oversized images and malformed or empty answers are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassificationError::Network(_) | ClassificationError::Timeout(_) => true,
            ClassificationError::Api(status, _) => is_transient_status(*status),
            ClassificationError::ImageFetch { status, .. } => {
                status.map_or(true, is_transient_status)
            }
            ClassificationError::ImageTooLarge { .. }
            | ClassificationError::Parse(_)
            | ClassificationError::EmptyResponse => false,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Error from one ingest pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing image input, user-correctable
    #[error("Invalid image input: {0}")]
    InvalidInput(String),

    /// Blob store write failed; the same payload can be retried
    #[error("Image storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::StorageUnavailable(err.to_string())
    }
}
