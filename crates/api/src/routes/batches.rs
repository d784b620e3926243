use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Mount batch routes (under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batches", post(batches::submit_batch))
        .route("/batches/{id}", get(batches::job_status))
        .route("/batches/{id}/results", get(batches::download_results))
}
