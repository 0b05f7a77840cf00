//! Chat-completion vision adapter (OpenAI API shape)
//!
//! Sends the prompt and the image URL in a single user message to
//! `POST {base_url}/chat/completions`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ImageReference, VisionClassifier, CLASSIFICATION_PROMPT};
use crate::pipeline::error::ClassificationError;

const MAX_TOKENS: u32 = 300;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// URL-based classifier
pub struct ChatCompletionClassifier {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionClassifier {
    pub fn new(http_client: reqwest::Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl VisionClassifier for ChatCompletionClassifier {
    fn name(&self) -> &'static str {
        "chat-completion"
    }

    async fn classify(&self, image: &ImageReference) -> Result<String, ClassificationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: CLASSIFICATION_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: &image.url },
                    },
                ],
            }],
            max_tokens: MAX_TOKENS,
        };

        tracing::debug!(model = %self.model, url = %image.url, "Querying chat-completion API");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassificationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Api(status.as_u16(), error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::Parse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ClassificationError::EmptyResponse);
        }

        Ok(content)
    }
}
