//! Standalone unit worker.
//!
//! Runs the worker pool and rescan loop without the HTTP server, for
//! deployments that scale processing separately from intake. Safe to
//! run alongside the API server's own workers: the guarded unit claim
//! makes double dispatch a no-op.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use batchpix_events::WebhookNotifier;
use batchpix_pipeline::{
    dispatcher, BatchStore, HttpImageTransformer, ImageTransformer, Notifier, PgBatchStore,
    WorkerPool,
};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batchpix_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let base_url = env_or("BASE_URL", "http://localhost:3000");
    let processed_dir = PathBuf::from(env_or("PROCESSED_DIR", "processed"));
    let webhook_secret = std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
    let worker_count: usize = env_or("WORKER_COUNT", "4")
        .parse()
        .expect("WORKER_COUNT must be a valid usize");
    let rescan_interval_secs: u64 = env_or("RESCAN_INTERVAL_SECS", "30")
        .parse()
        .expect("RESCAN_INTERVAL_SECS must be a valid u64");
    let rescan_min_age_secs: i64 = env_or("RESCAN_MIN_AGE_SECS", "60")
        .parse()
        .expect("RESCAN_MIN_AGE_SECS must be a valid i64");

    let pool = batchpix_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    batchpix_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection established");

    let store: Arc<dyn BatchStore> = Arc::new(PgBatchStore::new(pool.clone()));
    let transformer: Arc<dyn ImageTransformer> = Arc::new(
        HttpImageTransformer::new(processed_dir, &base_url)
            .expect("Failed to create output directory"),
    );
    let webhook = WebhookNotifier::new(webhook_secret);
    let notifier = Arc::new(Notifier::new(webhook, &base_url));

    let workers = Arc::new(WorkerPool::start(
        store.clone(),
        transformer,
        notifier,
        worker_count,
    ));
    tracing::info!(workers = worker_count, "Worker pool started");

    let cancel = CancellationToken::new();
    let rescan = tokio::spawn(dispatcher::run_rescan_loop(
        store,
        workers.clone(),
        Duration::from_secs(rescan_interval_secs),
        rescan_min_age_secs,
        cancel.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl-C handler");
    tracing::info!("Received shutdown signal, draining workers");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), rescan).await;
    workers.shutdown().await;
    pool.close().await;
    tracing::info!("Worker shutdown complete");
}
