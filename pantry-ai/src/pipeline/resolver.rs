//! Image source resolution
//!
//! Normalizes the three ways an image can arrive (inline `data:` string from
//! a camera capture, a file or upload body, a remote URL) into either a
//! pass-through URL or an [`ImagePayload`] ready for the blob store.

use base64::Engine;
use pantry_common::ImagePayload;
use std::fmt;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::PipelineError;

/// Image input as received from a caller
pub enum ImageSource {
    /// Self-describing `data:<mime>;base64,<payload>` string
    InlineData(String),
    /// Byte stream read fully into memory (opened file, upload body)
    File {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        /// Declared content type, if the caller knows one
        mime_hint: Option<String>,
    },
    /// Anything else; passed through untouched
    RemoteUrl(String),
}

impl ImageSource {
    /// Classify a user-supplied string as inline data or a remote URL
    pub fn from_text(input: impl Into<String>) -> Self {
        let input = input.into();
        if is_inline_data(&input) {
            ImageSource::InlineData(input)
        } else {
            ImageSource::RemoteUrl(input)
        }
    }

    /// Wrap an in-memory upload body
    pub fn from_bytes(bytes: Vec<u8>, mime_hint: Option<String>) -> Self {
        ImageSource::File {
            reader: Box::new(std::io::Cursor::new(bytes)),
            mime_hint,
        }
    }

    /// Open a local image file
    pub async fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            PipelineError::InvalidInput(format!("Cannot open {}: {}", path.display(), e))
        })?;

        Ok(ImageSource::File {
            reader: Box::new(file),
            mime_hint: None,
        })
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::InlineData(data) => f
                .debug_tuple("InlineData")
                .field(&format_args!("{} chars", data.len()))
                .finish(),
            ImageSource::File { mime_hint, .. } => f
                .debug_struct("File")
                .field("mime_hint", mime_hint)
                .finish_non_exhaustive(),
            ImageSource::RemoteUrl(url) => f.debug_tuple("RemoteUrl").field(url).finish(),
        }
    }
}

/// Result of resolving an [`ImageSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImage {
    /// Already reachable; no upload needed
    Url(String),
    /// Needs to go through the blob store
    Payload(ImagePayload),
}

/// True for strings that look like `data:` URLs
pub fn is_inline_data(input: &str) -> bool {
    input
        .trim_start()
        .get(..5)
        .map(|prefix| prefix.eq_ignore_ascii_case("data:"))
        .unwrap_or(false)
}

/// Resolve an image source
///
/// Fails with `InvalidInput` on empty input, undecodable inline data, or
/// content that is not an image.
pub async fn resolve(source: ImageSource) -> Result<ResolvedImage, PipelineError> {
    match source {
        ImageSource::RemoteUrl(url) => {
            if url.trim().is_empty() {
                return Err(PipelineError::InvalidInput("Image input is empty".to_string()));
            }
            tracing::debug!(url = %url, "Remote image URL passed through");
            Ok(ResolvedImage::Url(url))
        }
        ImageSource::InlineData(data) => {
            let payload = decode_inline(&data)?;
            tracing::debug!(
                mime_type = %payload.mime_type,
                bytes = payload.len(),
                "Decoded inline image data"
            );
            Ok(ResolvedImage::Payload(payload))
        }
        ImageSource::File { mut reader, mime_hint } => {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .await
                .map_err(|e| PipelineError::InvalidInput(format!("Cannot read image: {}", e)))?;

            if bytes.is_empty() {
                return Err(PipelineError::InvalidInput("Image file is empty".to_string()));
            }

            let mime_type = image_mime_type(&bytes, mime_hint.as_deref())?;
            tracing::debug!(mime_type = %mime_type, bytes = bytes.len(), "Read image file");
            Ok(ResolvedImage::Payload(ImagePayload::new(bytes, mime_type)))
        }
    }
}

/// Decode `data:<mime>[;params];base64,<payload>`
fn decode_inline(data: &str) -> Result<ImagePayload, PipelineError> {
    let data = data.trim();
    let body = data
        .get(5..)
        .ok_or_else(|| PipelineError::InvalidInput("Inline image data is empty".to_string()))?;

    let (header, encoded) = body.split_once(',').ok_or_else(|| {
        PipelineError::InvalidInput("Inline image data has no payload separator".to_string())
    })?;

    let mut params = header.split(';');
    let declared = params.next().unwrap_or("").trim().to_lowercase();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(PipelineError::InvalidInput(
            "Inline image data must be base64-encoded".to_string(),
        ));
    }

    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(PipelineError::InvalidInput("Inline image data is empty".to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| PipelineError::InvalidInput(format!("Inline image data is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(PipelineError::InvalidInput("Inline image data is empty".to_string()));
    }

    let hint = (!declared.is_empty()).then_some(declared.as_str());
    let mime_type = image_mime_type(&bytes, hint)?;
    Ok(ImagePayload::new(bytes, mime_type))
}

/// Determine the content type from the bytes themselves
///
/// Magic-byte sniffing decides; a declared `image/*` type is only used for
/// bytes `infer` cannot identify. Recognised non-image content is rejected
/// whatever was declared.
fn image_mime_type(bytes: &[u8], hint: Option<&str>) -> Result<String, PipelineError> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            Ok(kind.mime_type().to_string())
        }
        Some(kind) => Err(PipelineError::InvalidInput(format!(
            "Expected an image, got {}",
            kind.mime_type()
        ))),
        None => hint
            .map(|h| h.split(';').next().unwrap_or("").trim().to_lowercase())
            .filter(|h| h.starts_with("image/") && looks_binary(bytes))
            .ok_or_else(|| PipelineError::InvalidInput("Unrecognized image content".to_string())),
    }
}

/// Plain text (HTML, JSON, SVG markup) is never accepted as an image
fn looks_binary(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.chars().any(|c| c.is_control() && !c.is_whitespace()),
        Err(_) => true,
    }
}
