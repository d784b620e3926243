use std::sync::Arc;

use batchpix_pipeline::{BatchStore, Notifier, WorkerPool};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc`). Handlers only see
/// the storage trait object, so integration tests run the full router
/// against the in-memory store.
#[derive(Clone)]
pub struct AppState {
    /// Job/product/unit storage.
    pub store: Arc<dyn BatchStore>,
    /// Running unit worker pool.
    pub workers: Arc<WorkerPool>,
    /// Completion notification builder/dispatcher.
    pub notifier: Arc<Notifier>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
