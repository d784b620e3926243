//! Product entity: one row of the input batch.

use batchpix_core::types::{DbId, JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `products` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: DbId,
    pub job_id: JobId,
    /// Verbatim from the input; duplicates and gaps are allowed.
    pub serial_number: i64,
    pub product_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
