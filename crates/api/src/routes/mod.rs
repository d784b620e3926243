pub mod batches;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /batches                submit batch (POST multipart)
/// /batches/{id}           job status
/// /batches/{id}/results   result report download
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(batches::router())
}
