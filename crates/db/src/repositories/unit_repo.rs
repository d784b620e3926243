//! Repository for the `units` table.
//!
//! Unit state transitions are guarded updates: a worker only moves a
//! unit out of `pending` if it is still pending, which makes duplicate
//! or late task delivery a harmless no-op.

use batchpix_core::types::{DbId, JobId};
use sqlx::{PgConnection, PgPool};

use crate::models::status::UnitStatus;
use crate::models::unit::{PendingUnit, Unit};

/// Column list for `units` queries.
const COLUMNS: &str = "id, product_id, input_url, output_url, status_id, created_at, updated_at";

/// Provides CRUD and claim operations for processing units.
pub struct UnitRepo;

impl UnitRepo {
    /// Insert one pending unit. Runs on the decomposition transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        product_id: DbId,
        input_url: &str,
    ) -> Result<Unit, sqlx::Error> {
        let query = format!(
            "INSERT INTO units (product_id, input_url, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Unit>(&query)
            .bind(product_id)
            .bind(input_url)
            .bind(UnitStatus::Pending.id())
            .fetch_one(conn)
            .await
    }

    /// Atomically claim a pending unit for processing.
    ///
    /// Returns `None` if the unit does not exist or is no longer
    /// pending -- the caller must treat that as a no-op.
    pub async fn claim_for_processing(
        pool: &PgPool,
        unit_id: DbId,
    ) -> Result<Option<Unit>, sqlx::Error> {
        let query = format!(
            "UPDATE units SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Unit>(&query)
            .bind(unit_id)
            .bind(UnitStatus::Processing.id())
            .bind(UnitStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Record a successful transform: terminal `completed` with the
    /// produced output locator.
    pub async fn complete(
        pool: &PgPool,
        unit_id: DbId,
        output_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE units SET status_id = $2, output_url = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(unit_id)
        .bind(UnitStatus::Completed.id())
        .bind(output_url)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed transform: terminal `failed`, no output locator.
    pub async fn fail(pool: &PgPool, unit_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE units SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(unit_id)
            .bind(UnitStatus::Failed.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// List a product's units in creation order (report row order).
    pub async fn list_by_product(
        pool: &PgPool,
        product_id: DbId,
    ) -> Result<Vec<Unit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM units WHERE product_id = $1 ORDER BY id");
        sqlx::query_as::<_, Unit>(&query)
            .bind(product_id)
            .fetch_all(pool)
            .await
    }

    /// IDs of a job's units still awaiting dispatch.
    pub async fn pending_by_job(pool: &PgPool, job_id: JobId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT u.id FROM units u \
             JOIN products p ON p.id = u.product_id \
             WHERE p.job_id = $1 AND u.status_id = $2 \
             ORDER BY u.id",
        )
        .bind(job_id)
        .bind(UnitStatus::Pending.id())
        .fetch_all(pool)
        .await
    }

    /// Units that have sat in `pending` longer than `older_than_secs`,
    /// joined with their owning job. Used by the worker's rescan loop
    /// to re-dispatch tasks lost to a crash or restart.
    pub async fn list_stale_pending(
        pool: &PgPool,
        older_than_secs: i64,
        limit: i64,
    ) -> Result<Vec<PendingUnit>, sqlx::Error> {
        sqlx::query_as::<_, PendingUnit>(
            "SELECT u.id AS unit_id, p.job_id AS job_id FROM units u \
             JOIN products p ON p.id = u.product_id \
             WHERE u.status_id = $1 \
               AND u.updated_at < NOW() - make_interval(secs => $2::DOUBLE PRECISION) \
             ORDER BY u.id \
             LIMIT $3",
        )
        .bind(UnitStatus::Pending.id())
        .bind(older_than_secs as f64)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
