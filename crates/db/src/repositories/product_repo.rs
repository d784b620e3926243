//! Repository for the `products` table.

use batchpix_core::types::JobId;
use sqlx::{PgConnection, PgPool};

use crate::models::product::Product;

/// Column list for `products` queries.
const COLUMNS: &str = "id, job_id, serial_number, product_name, created_at, updated_at";

/// Provides CRUD operations for batch products.
pub struct ProductRepo;

impl ProductRepo {
    /// Insert one product row. Runs on the decomposition transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        job_id: JobId,
        serial_number: i64,
        product_name: &str,
    ) -> Result<Product, sqlx::Error> {
        let query = format!(
            "INSERT INTO products (job_id, serial_number, product_name) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(job_id)
            .bind(serial_number)
            .bind(product_name)
            .fetch_one(conn)
            .await
    }

    /// List a job's products ordered by declared serial number.
    ///
    /// Ties on duplicate serials fall back to insertion order, keeping
    /// report output stable across regenerations.
    pub async fn list_by_job(pool: &PgPool, job_id: JobId) -> Result<Vec<Product>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM products WHERE job_id = $1 ORDER BY serial_number, id"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
