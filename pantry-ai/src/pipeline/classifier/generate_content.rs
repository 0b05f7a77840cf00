//! Generate-content vision adapter (Gemini API shape)
//!
//! This API does not dereference URLs, so the image travels inline as
//! base64. Bytes already held by the pipeline are reused; otherwise the
//! URL is fetched first.

use async_trait::async_trait;
use base64::Engine;
use pantry_common::ImagePayload;
use serde::{Deserialize, Serialize};

use super::{ImageReference, VisionClassifier, CLASSIFICATION_PROMPT};
use crate::pipeline::error::ClassificationError;
use crate::pipeline::MAX_IMAGE_BYTES;

/// Used when neither the response header nor the bytes identify the type
const FALLBACK_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Inline-base64 classifier
pub struct GenerateContentClassifier {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_image_bytes: usize,
}

impl GenerateContentClassifier {
    pub fn new(http_client: reqwest::Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client,
            endpoint: format!(
                "{}/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            api_key: api_key.to_string(),
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Cap on images downloaded by [`Self::fetch_image`]
    pub fn with_max_image_bytes(mut self, limit: usize) -> Self {
        self.max_image_bytes = limit;
        self
    }

    /// Download an image the pipeline no longer holds in memory
    async fn fetch_image(&self, url: &str) -> Result<ImagePayload, ClassificationError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ClassificationError::ImageFetch {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassificationError::ImageFetch {
                status: Some(status.as_u16()),
                message: format!("GET {} returned {}", url, status),
            });
        }

        let limit = self.max_image_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(ClassificationError::ImageTooLarge { limit });
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_lowercase())
            .filter(|v| v.starts_with("image/"));

        // Content-Length may be absent or wrong; enforce the cap while streaming
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            ClassificationError::ImageFetch {
                status: None,
                message: e.to_string(),
            }
        })? {
            if bytes.len() + chunk.len() > limit {
                return Err(ClassificationError::ImageTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(ClassificationError::ImageFetch {
                status: Some(status.as_u16()),
                message: format!("{} returned no bytes", url),
            });
        }

        let mime_type = header_mime
            .or_else(|| {
                infer::get(&bytes)
                    .filter(|k| k.matcher_type() == infer::MatcherType::Image)
                    .map(|k| k.mime_type().to_string())
            })
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

        Ok(ImagePayload::new(bytes, mime_type))
    }
}

#[async_trait]
impl VisionClassifier for GenerateContentClassifier {
    fn name(&self) -> &'static str {
        "generate-content"
    }

    async fn classify(&self, image: &ImageReference) -> Result<String, ClassificationError> {
        let fetched;
        let payload = match &image.payload {
            Some(payload) => payload,
            None => {
                fetched = self.fetch_image(&image.url).await?;
                &fetched
            }
        };

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: CLASSIFICATION_PROMPT,
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: &payload.mime_type,
                            data: base64::engine::general_purpose::STANDARD.encode(&payload.bytes),
                        },
                    },
                ],
            }],
        };

        tracing::debug!(
            mime_type = %payload.mime_type,
            bytes = payload.len(),
            "Querying generate-content API"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassificationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Api(status.as_u16(), error_text));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::Parse(e.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyResponse);
        }

        Ok(text)
    }
}
