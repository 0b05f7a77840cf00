//! Vision adapter tests against a local fake provider
//!
//! Exercises the real reqwest adapters end to end: request shape,
//! authentication, error statuses and retry behavior.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::Engine;
use pantry_ai::config::VisionSettings;
use pantry_ai::pipeline::{
    classifier::{ChatCompletionClassifier, GenerateContentClassifier},
    ClassificationClient, ClassificationError, ImageReference, VisionClassifier,
};
use pantry_ai::utils::RetryPolicy;
use pantry_common::config::VisionProvider;
use pantry_common::ImagePayload;

use helpers::{FakeVisionServer, LARGE_IMAGE_BYTES, PNG_BYTES};

fn client(backend: Arc<dyn VisionClassifier>, retries: u32) -> ClassificationClient {
    ClassificationClient::new(backend, Duration::from_secs(5), RetryPolicy::new(retries, 10))
}

fn chat(server: &FakeVisionServer) -> Arc<dyn VisionClassifier> {
    Arc::new(ChatCompletionClassifier::new(
        reqwest::Client::new(),
        &server.api_base(),
        "gpt-4o-mini",
        "test-key",
    ))
}

fn generate(server: &FakeVisionServer) -> Arc<dyn VisionClassifier> {
    Arc::new(GenerateContentClassifier::new(
        reqwest::Client::new(),
        &server.api_base(),
        "gemini-1.5-flash",
        "test-key",
    ))
}

#[tokio::test]
async fn test_chat_completion_sends_url_and_normalizes_answer() {
    let server = FakeVisionServer::start(StatusCode::OK, "Bread, Milk, , Eggs").await;
    let client = client(chat(&server), 0);

    let result = client
        .classify(&ImageReference::url("https://cdn.example.com/shelf.jpg"))
        .await
        .unwrap();

    assert_eq!(result.raw_text, "Bread, Milk, , Eggs");
    assert_eq!(result.tags, vec!["Bread", "Milk", "Eggs"]);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.path, "/v1/chat/completions");
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(request.body["model"], "gpt-4o-mini");

    let content = &request.body["messages"][0]["content"];
    assert_eq!(content[0]["type"], "text");
    assert!(content[0]["text"].as_str().unwrap().contains("comma-separated"));
    assert_eq!(content[1]["image_url"]["url"], "https://cdn.example.com/shelf.jpg");
}

#[tokio::test]
async fn test_generate_content_sends_inline_payload() {
    let server = FakeVisionServer::start(StatusCode::OK, "jam, honey").await;
    let client = client(generate(&server), 0);

    let image = ImageReference::with_payload(
        "http://pantry.test/pantry_images/1-abc.png",
        ImagePayload::new(PNG_BYTES.to_vec(), "image/png"),
    );
    let result = client.classify(&image).await.unwrap();
    assert_eq!(result.tags, vec!["jam", "honey"]);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.path, "/v1/models/gemini-1.5-flash:generateContent");
    assert_eq!(request.query.as_deref(), Some("key=test-key"));
    assert!(request.authorization.is_none());

    let inline = &request.body["contents"][0]["parts"][1]["inlineData"];
    assert_eq!(inline["mimeType"], "image/png");
    assert_eq!(
        inline["data"],
        base64::engine::general_purpose::STANDARD.encode(PNG_BYTES)
    );
}

#[tokio::test]
async fn test_generate_content_fetches_image_without_payload() {
    let server = FakeVisionServer::start(StatusCode::OK, "flour").await;
    let client = client(generate(&server), 0);

    let result = client
        .classify(&ImageReference::url(server.image_url()))
        .await
        .unwrap();
    assert_eq!(result.tags, vec!["flour"]);

    let requests = server.requests();
    let inline = &requests[0].body["contents"][0]["parts"][1]["inlineData"];
    assert_eq!(inline["mimeType"], "image/png");
}

#[tokio::test]
async fn test_generate_content_unreachable_image() {
    let server = FakeVisionServer::start(StatusCode::OK, "flour").await;
    let client = client(generate(&server), 0);

    let err = client
        .classify(&ImageReference::url(format!("{}/missing.png", server.base_url)))
        .await
        .unwrap_err();

    assert!(matches!(err, ClassificationError::ImageFetch { status: Some(404), .. }));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_missing_image_is_fetched_once() {
    let server = FakeVisionServer::start(StatusCode::OK, "flour").await;
    let client = client(generate(&server), 3);

    let err = client
        .classify(&ImageReference::url(server.image_url_for("gone.png")))
        .await
        .unwrap_err();

    assert!(matches!(err, ClassificationError::ImageFetch { status: Some(404), .. }));
    assert_eq!(server.image_fetches(), 1);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_unavailable_image_is_retried() {
    let server = FakeVisionServer::start(StatusCode::OK, "flour").await;
    let client = client(generate(&server), 2);

    let err = client
        .classify(&ImageReference::url(server.image_url_for("flaky.png")))
        .await
        .unwrap_err();

    assert!(matches!(err, ClassificationError::ImageFetch { status: Some(503), .. }));
    assert_eq!(server.image_fetches(), 3);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_oversized_image_is_refused() {
    let server = FakeVisionServer::start(StatusCode::OK, "flour").await;
    let backend = GenerateContentClassifier::new(
        reqwest::Client::new(),
        &server.api_base(),
        "gemini-1.5-flash",
        "test-key",
    )
    .with_max_image_bytes(LARGE_IMAGE_BYTES / 2);
    let client = client(Arc::new(backend), 3);

    let err = client
        .classify(&ImageReference::url(server.image_url_for("large.png")))
        .await
        .unwrap_err();

    match err {
        ClassificationError::ImageTooLarge { limit } => assert_eq!(limit, LARGE_IMAGE_BYTES / 2),
        other => panic!("expected ImageTooLarge, got {:?}", other),
    }
    assert_eq!(server.image_fetches(), 1);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_image_within_cap_is_accepted() {
    let server = FakeVisionServer::start(StatusCode::OK, "flour").await;
    let backend = GenerateContentClassifier::new(
        reqwest::Client::new(),
        &server.api_base(),
        "gemini-1.5-flash",
        "test-key",
    )
    .with_max_image_bytes(LARGE_IMAGE_BYTES);
    let client = client(Arc::new(backend), 0);

    let result = client
        .classify(&ImageReference::url(server.image_url_for("large.png")))
        .await
        .unwrap();

    assert_eq!(result.tags, vec!["flour"]);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = FakeVisionServer::start(StatusCode::UNAUTHORIZED, "").await;
    let client = client(chat(&server), 3);

    let err = client
        .classify(&ImageReference::url("https://cdn.example.com/a.jpg"))
        .await
        .unwrap_err();

    match err {
        ClassificationError::Api(status, body) => {
            assert_eq!(status, 401);
            assert!(body.contains("fake failure"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_server_error_is_retried_then_surfaced() {
    let server = FakeVisionServer::start(StatusCode::BAD_GATEWAY, "").await;
    let client = client(chat(&server), 2);

    let err = client
        .classify(&ImageReference::url("https://cdn.example.com/a.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClassificationError::Api(502, _)));
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_empty_answer_is_an_error() {
    let server = FakeVisionServer::start(StatusCode::OK, "   ").await;
    let client = client(generate(&server), 2);

    let image = ImageReference::with_payload(
        "http://pantry.test/pantry_images/1-abc.png",
        ImagePayload::new(PNG_BYTES.to_vec(), "image/png"),
    );
    let err = client.classify(&image).await.unwrap_err();

    assert!(matches!(err, ClassificationError::EmptyResponse));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_unparseable_answer_yields_empty_tags() {
    let server = FakeVisionServer::start(StatusCode::OK, " , ,, ").await;
    let client = client(chat(&server), 0);

    let result = client
        .classify(&ImageReference::url("https://cdn.example.com/a.jpg"))
        .await
        .unwrap();

    assert!(result.tags.is_empty());
}

#[tokio::test]
async fn test_from_settings_selects_adapter() {
    let server = FakeVisionServer::start(StatusCode::OK, "tea").await;

    for (provider, expected) in [
        (VisionProvider::OpenAi, "chat-completion"),
        (VisionProvider::Gemini, "generate-content"),
    ] {
        let settings = VisionSettings {
            provider,
            model: provider.default_model().to_string(),
            base_url: server.api_base(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        };

        let client = ClassificationClient::from_settings(&settings).unwrap();
        assert_eq!(client.backend_name(), expected);
    }
}
