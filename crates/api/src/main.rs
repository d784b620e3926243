use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use batchpix_api::config::ServerConfig;
use batchpix_api::state::AppState;
use batchpix_api::routes;
use batchpix_events::WebhookNotifier;
use batchpix_pipeline::{
    dispatcher, BatchStore, HttpImageTransformer, ImageTransformer, Notifier, PgBatchStore,
    WorkerPool,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batchpix_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = batchpix_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    batchpix_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    batchpix_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Pipeline ---
    let store: Arc<dyn BatchStore> = Arc::new(PgBatchStore::new(pool.clone()));

    let transformer: Arc<dyn ImageTransformer> = Arc::new(
        HttpImageTransformer::new(config.processed_dir.clone(), &config.base_url)
            .expect("Failed to create output directory"),
    );

    let webhook = WebhookNotifier::new(config.webhook_secret.clone());
    let notifier = Arc::new(Notifier::new(webhook, &config.base_url));

    let workers = Arc::new(WorkerPool::start(
        store.clone(),
        transformer,
        notifier.clone(),
        config.worker_count,
    ));
    tracing::info!(workers = config.worker_count, "Worker pool started");

    // Recover units dispatched before a crash or dropped when a
    // request timed out mid-dispatch.
    let rescan_cancel = CancellationToken::new();
    let rescan_handle = tokio::spawn(dispatcher::run_rescan_loop(
        store.clone(),
        workers.clone(),
        Duration::from_secs(config.rescan_interval_secs),
        config.rescan_min_age_secs,
        rescan_cancel.clone(),
    ));
    tracing::info!(
        interval_secs = config.rescan_interval_secs,
        "Rescan loop started"
    );

    // --- App state ---
    let state = AppState {
        store,
        workers: workers.clone(),
        notifier,
        config: Arc::new(config.clone()),
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // Transformed images as static files.
        .nest_service("/processed", ServeDir::new(&config.processed_dir))
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    rescan_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), rescan_handle).await;
    tracing::info!("Rescan loop stopped");

    // Let in-flight units finish; undispatched ones are re-queued by
    // the rescan loop on the next start.
    workers.shutdown().await;
    tracing::info!("Worker pool drained");

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
