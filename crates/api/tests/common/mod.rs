use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderName, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use async_trait::async_trait;
use batchpix_api::config::ServerConfig;
use batchpix_api::routes;
use batchpix_api::state::AppState;
use batchpix_events::{WebhookError, WebhookNotifier, WebhookTransport};
use batchpix_pipeline::{
    BatchStore, ImageTransformer, MemoryStore, Notifier, TransformError, WorkerPool,
};

/// Transformer double: deterministic output URL, no I/O.
struct FakeTransformer;

#[async_trait]
impl ImageTransformer for FakeTransformer {
    async fn transform(&self, input_url: &str) -> Result<String, TransformError> {
        Ok(format!("{input_url}/out.jpg"))
    }
}

/// Webhook transport double that swallows every delivery.
struct NullTransport;

#[async_trait]
impl WebhookTransport for NullTransport {
    async fn post(
        &self,
        _url: &str,
        _signature: Option<&str>,
        _body: &str,
    ) -> Result<(), WebhookError> {
        Ok(())
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        processed_dir: PathBuf::from("processed"),
        webhook_secret: None,
        worker_count: 2,
        request_timeout_secs: 30,
        rescan_interval_secs: 30,
        rescan_min_age_secs: 60,
    }
}

/// Build the full application router with all middleware layers over
/// the in-memory store.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (request ID, timeout, tracing,
/// panic recovery) that production uses. Also returns the store so
/// tests can seed or inspect state directly.
pub fn build_test_app() -> (Router, Arc<dyn BatchStore>) {
    let config = test_config();
    let store: Arc<dyn BatchStore> = Arc::new(MemoryStore::new());

    let webhook = WebhookNotifier::with_transport(Arc::new(NullTransport), None);
    let notifier = Arc::new(Notifier::new(webhook, &config.base_url));
    let workers = Arc::new(WorkerPool::start(
        store.clone(),
        Arc::new(FakeTransformer),
        notifier.clone(),
        config.worker_count,
    ));

    let state = AppState {
        store: store.clone(),
        workers,
        notifier,
        config: Arc::new(config),
    };

    let request_id_header = HeaderName::from_static("x-request-id");

    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state);

    (app, store)
}

/// Perform a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

const BOUNDARY: &str = "X-BATCHPIX-TEST-BOUNDARY";

/// POST a multipart batch submission with a CSV file part and an
/// optional webhook URL part.
pub async fn post_batch(app: Router, csv: Option<&str>, webhook_url: Option<&str>) -> Response<Body> {
    let mut body = String::new();
    if let Some(csv) = csv {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"batch.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {csv}\r\n"
        ));
    }
    if let Some(url) = webhook_url {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"webhook_url\"\r\n\r\n\
             {url}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/v1/batches")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
