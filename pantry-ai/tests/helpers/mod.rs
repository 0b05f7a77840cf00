//! Shared fixtures for pantry-ai integration tests
//!
//! - `StubClassifier`: scripted vision backend, no network
//! - `TestApp`: router + state over in-memory SQLite and a temp image folder
//! - `FakeVisionServer`: local HTTP server speaking both provider API shapes

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

use pantry_ai::db::{self, SqliteItemRepository};
use pantry_ai::pipeline::{
    ClassificationClient, ClassificationError, ImageReference, IngestPipeline, LocalImageStore,
    VisionClassifier,
};
use pantry_ai::utils::RetryPolicy;
use pantry_ai::{build_router, AppState};

pub const PUBLIC_BASE_URL: &str = "http://pantry.test";

/// Smallest byte sequence `infer` recognises as PNG
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR\x00\x00\x00\x01\x00\x00\x00\x01\x08\x02\x00\x00\x00";

/// PNG bytes as a `data:` URL
pub fn png_data_url() -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(PNG_BYTES)
    )
}

#[derive(Debug, Clone)]
enum Behavior {
    Answer(String),
    Fail(u16),
}

/// Scripted vision backend
pub struct StubClassifier {
    behavior: Behavior,
    delay: Duration,
    calls: AtomicU32,
    last_image: Mutex<Option<ImageReference>>,
}

impl StubClassifier {
    pub fn answering(text: &str) -> Self {
        Self::with_behavior(Behavior::Answer(text.to_string()))
    }

    /// Always fails with an API error of the given status
    pub fn failing(status: u16) -> Self {
        Self::with_behavior(Behavior::Fail(status))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            last_image: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<ImageReference> {
        self.last_image.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionClassifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn classify(&self, image: &ImageReference) -> Result<String, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Answer(text) => Ok(text.clone()),
            Behavior::Fail(status) => Err(ClassificationError::Api(
                *status,
                "scripted failure".to_string(),
            )),
        }
    }
}

/// Classification client around a stub, single attempt
pub fn stub_client(stub: Arc<StubClassifier>) -> ClassificationClient {
    ClassificationClient::new(stub, Duration::from_secs(5), RetryPolicy::none())
}

/// Pipeline writing into `dir`
pub fn test_pipeline(dir: &TempDir, stub: Arc<StubClassifier>) -> IngestPipeline {
    let store = LocalImageStore::new(dir.path(), PUBLIC_BASE_URL, RetryPolicy::none());
    IngestPipeline::new(Arc::new(store), stub_client(stub))
}

/// In-memory database with the pantry schema
pub async fn test_pool() -> SqlitePool {
    // Single connection so every query sees the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::init_tables(&pool)
        .await
        .expect("Failed to initialize schema");
    pool
}

/// Stored image files, ignoring in-flight temp files
pub fn stored_images(dir: &TempDir) -> Vec<PathBuf> {
    let images = dir.path().join("pantry_images");
    match std::fs::read_dir(images) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                !p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.starts_with("tmp-"))
                    .unwrap_or(false)
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub stub: Arc<StubClassifier>,
    pub dir: TempDir,
}

/// Full application over test doubles
pub async fn create_test_app(stub: StubClassifier) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let stub = Arc::new(stub);
    let pool = test_pool().await;

    let pipeline = test_pipeline(&dir, stub.clone());
    let items = SqliteItemRepository::new(pool.clone());
    let state = AppState::new(pipeline, Arc::new(items), dir.path().join("pantry_images"));

    TestApp {
        router: build_router(state),
        pool,
        stub,
        dir,
    }
}

/// Request as seen by the fake vision server
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    answer: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    image_fetches: Arc<AtomicU32>,
}

/// Size of the body served at `/images/large.png`
pub const LARGE_IMAGE_BYTES: usize = 64 * 1024;

/// Local stand-in for a vision provider
///
/// Besides the model endpoints it serves a few images:
/// `item.png` (valid PNG), `large.png` (PNG header padded to
/// [`LARGE_IMAGE_BYTES`]), `flaky.png` (always 503). Anything else is 404.
pub struct FakeVisionServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    image_fetches: Arc<AtomicU32>,
}

impl FakeVisionServer {
    /// Start a server answering every model call with `status` and `answer`
    pub async fn start(status: StatusCode, answer: &str) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let image_fetches = Arc::new(AtomicU32::new(0));
        let state = FakeState {
            status,
            answer: answer.to_string(),
            requests: requests.clone(),
            image_fetches: image_fetches.clone(),
        };

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .route("/v1/models/:call", post(generate_content))
            .route("/images/:name", get(serve_image))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake vision server");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
            image_fetches,
        }
    }

    /// API base URL to configure an adapter with
    pub fn api_base(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    /// URL of a PNG served by this server
    pub fn image_url(&self) -> String {
        format!("{}/images/item.png", self.base_url)
    }

    /// URL of any image name under `/images/`
    pub fn image_url_for(&self, name: &str) -> String {
        format!("{}/images/{}", self.base_url, name)
    }

    /// Model calls received so far
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// GETs received under `/images/`
    pub fn image_fetches(&self) -> u32 {
        self.image_fetches.load(Ordering::SeqCst)
    }
}

fn capture(state: &FakeState, uri: &OriginalUri, headers: &HeaderMap, body: Value) {
    state.requests.lock().unwrap().push(CapturedRequest {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
}

async fn chat_completions(
    State(state): State<FakeState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    capture(&state, &uri, &headers, body);

    if !state.status.is_success() {
        return (state.status, Json(json!({"error": {"message": "fake failure"}})));
    }

    (
        StatusCode::OK,
        Json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": state.answer}
            }]
        })),
    )
}

async fn generate_content(
    State(state): State<FakeState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    capture(&state, &uri, &headers, body);

    if !state.status.is_success() {
        return (state.status, Json(json!({"error": {"message": "fake failure"}})));
    }

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {"parts": [{"text": state.answer}], "role": "model"}
            }]
        })),
    )
}

async fn serve_image(
    State(state): State<FakeState>,
    Path(name): Path<String>,
) -> axum::response::Response {
    state.image_fetches.fetch_add(1, Ordering::SeqCst);

    match name.as_str() {
        "item.png" => ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response(),
        "large.png" => {
            let mut body = PNG_BYTES.to_vec();
            body.resize(LARGE_IMAGE_BYTES, 0);
            ([(header::CONTENT_TYPE, "image/png")], body).into_response()
        }
        "flaky.png" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
