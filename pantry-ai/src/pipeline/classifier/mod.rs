//! Image classification
//!
//! `VisionClassifier` is the capability "image in, free text out". Two
//! adapters implement it and one is selected from configuration:
//! - [`ChatCompletionClassifier`]: OpenAI-style chat completion, sends the image URL
//! - [`GenerateContentClassifier`]: Gemini-style generate-content, sends inline base64 bytes
//!
//! [`ClassificationClient`] wraps the selected adapter with the timeout and
//! retry policy and normalizes the answer into tags.

mod chat_completion;
mod generate_content;

pub use chat_completion::ChatCompletionClassifier;
pub use generate_content::GenerateContentClassifier;

use async_trait::async_trait;
use pantry_common::config::VisionProvider;
use pantry_common::{ClassificationResult, ImagePayload};
use std::sync::Arc;
use std::time::Duration;

use super::error::ClassificationError;
use crate::config::VisionSettings;
use crate::utils::{retry_with_backoff, RetryPolicy};

/// Instruction sent with every image
pub const CLASSIFICATION_PROMPT: &str = "What items do you see in this image? \
Reply with a comma-separated list of up to 5 short tags describing the visible contents, \
focusing on food items if present. Reply with the tags only.";

const USER_AGENT: &str = concat!("pantry-ai/", env!("CARGO_PKG_VERSION"));

/// Image handed to a classifier
///
/// `url` is always set. `payload` carries the bytes when the pipeline still
/// holds them, so inline adapters can skip re-downloading.
#[derive(Debug, Clone)]
pub struct ImageReference {
    pub url: String,
    pub payload: Option<ImagePayload>,
}

impl ImageReference {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            payload: None,
        }
    }

    pub fn with_payload(url: impl Into<String>, payload: ImagePayload) -> Self {
        Self {
            url: url.into(),
            payload: Some(payload),
        }
    }
}

/// Vision model capability
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// One round trip to the model, returning its raw text answer
    async fn classify(&self, image: &ImageReference) -> Result<String, ClassificationError>;
}

/// Timeout + retry wrapper around a [`VisionClassifier`]
#[derive(Clone)]
pub struct ClassificationClient {
    backend: Arc<dyn VisionClassifier>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ClassificationClient {
    pub fn new(backend: Arc<dyn VisionClassifier>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            backend,
            timeout,
            retry,
        }
    }

    /// Build the adapter named by `settings.provider`
    pub fn from_settings(settings: &VisionSettings) -> Result<Self, ClassificationError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ClassificationError::Network(e.to_string()))?;

        let backend: Arc<dyn VisionClassifier> = match settings.provider {
            VisionProvider::OpenAi => Arc::new(ChatCompletionClassifier::new(
                http,
                &settings.base_url,
                &settings.model,
                &settings.api_key,
            )),
            VisionProvider::Gemini => Arc::new(GenerateContentClassifier::new(
                http,
                &settings.base_url,
                &settings.model,
                &settings.api_key,
            )),
        };

        tracing::info!(
            provider = %settings.provider,
            model = %settings.model,
            timeout_secs = settings.timeout.as_secs(),
            max_retries = settings.max_retries,
            "Classification backend configured"
        );

        Ok(Self::new(
            backend,
            settings.timeout,
            RetryPolicy::new(settings.max_retries, 500),
        ))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Classify an image and normalize the answer
    ///
    /// An empty answer is a `ClassificationError::EmptyResponse`; a
    /// non-empty answer that yields no usable tags is returned with an
    /// empty tag list.
    pub async fn classify(
        &self,
        image: &ImageReference,
    ) -> Result<ClassificationResult, ClassificationError> {
        let backend = self.backend.clone();
        let timeout = self.timeout;

        let raw = retry_with_backoff(
            "classification",
            self.retry,
            ClassificationError::is_retryable,
            || {
                let backend = backend.clone();
                async move {
                    match tokio::time::timeout(timeout, backend.classify(image)).await {
                        Ok(result) => result,
                        Err(_) => Err(ClassificationError::Timeout(timeout)),
                    }
                }
            },
        )
        .await?;

        if raw.trim().is_empty() {
            return Err(ClassificationError::EmptyResponse);
        }

        let result = ClassificationResult::from_raw(raw);
        tracing::info!(
            backend = self.backend.name(),
            tags = ?result.tags,
            "Image classified"
        );
        Ok(result)
    }
}
