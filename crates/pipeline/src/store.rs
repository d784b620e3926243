//! Storage interface for the orchestration pipeline.
//!
//! [`BatchStore`] is the single shared mutable resource of the system:
//! every cross-task state change (unit terminal transitions, the job
//! recount, notify-status writes) goes through it, and implementations
//! must make the recount a serialized read-modify-write so concurrent
//! unit completions cannot both claim the terminal transition.

use async_trait::async_trait;
use batchpix_core::intake::BatchRow;
use batchpix_core::report::ReportRow;
use batchpix_core::types::{DbId, JobId};
use batchpix_db::models::job::{Job, JobProgress};
use batchpix_db::models::status::NotifyStatus;
use batchpix_db::models::unit::{PendingUnit, Unit};
use batchpix_db::repositories::{JobRepo, ProductRepo, UnitRepo};
use batchpix_db::DbPool;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal store error: {0}")]
    Internal(String),
}

/// Transactional record store for the job / product / unit entities.
///
/// Taken as an explicit `Arc<dyn BatchStore>` handle by every pipeline
/// component (dependency injection; no process-wide application
/// context).
#[async_trait]
pub trait BatchStore: Send + Sync + 'static {
    /// Create a job with its declared unit count frozen in. The
    /// notification is armed iff `notify_url` is given.
    async fn create_job(
        &self,
        notify_url: Option<&str>,
        total_units: i32,
    ) -> Result<Job, StoreError>;

    async fn find_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Remove a job and everything under it. Only used to roll back a
    /// decomposition whose graph insert failed.
    async fn delete_job(&self, id: JobId) -> Result<(), StoreError>;

    /// Atomically persist the full product/unit graph for a job and
    /// advance it to `processing`. All-or-nothing: any failure rolls
    /// the whole graph back.
    async fn insert_graph(&self, job_id: JobId, rows: &[BatchRow]) -> Result<(), StoreError>;

    /// IDs of the job's units still awaiting dispatch.
    async fn pending_units(&self, job_id: JobId) -> Result<Vec<DbId>, StoreError>;

    /// Units pending for longer than `older_than_secs`, across all
    /// jobs (rescan after crash/restart).
    async fn stale_pending_units(
        &self,
        older_than_secs: i64,
        limit: i64,
    ) -> Result<Vec<PendingUnit>, StoreError>;

    /// Guarded claim: move a unit from `pending` to `processing`.
    /// `None` when the unit is unknown or no longer pending.
    async fn claim_unit(&self, unit_id: DbId) -> Result<Option<Unit>, StoreError>;

    /// Terminal success: record the transform's output locator.
    async fn complete_unit(&self, unit_id: DbId, output_url: &str) -> Result<(), StoreError>;

    /// Terminal failure: no output locator is ever set.
    async fn fail_unit(&self, unit_id: DbId) -> Result<(), StoreError>;

    /// Serialized recount of terminal units against the job row.
    /// `newly_completed` is true for exactly one caller per job.
    async fn recount_job(&self, id: JobId) -> Result<Option<JobProgress>, StoreError>;

    /// Record webhook delivery status; `sent` is never overwritten.
    async fn set_notify_status(&self, id: JobId, status: NotifyStatus)
        -> Result<bool, StoreError>;

    /// Assemble report rows ordered by declared serial number, units
    /// in per-product creation order.
    async fn report_rows(&self, id: JobId) -> Result<Vec<ReportRow>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// [`BatchStore`] backed by the Postgres repositories.
pub struct PgBatchStore {
    pool: DbPool,
}

impl PgBatchStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchStore for PgBatchStore {
    async fn create_job(
        &self,
        notify_url: Option<&str>,
        total_units: i32,
    ) -> Result<Job, StoreError> {
        Ok(JobRepo::create(&self.pool, notify_url, total_units).await?)
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn delete_job(&self, id: JobId) -> Result<(), StoreError> {
        Ok(JobRepo::delete(&self.pool, id).await?)
    }

    async fn insert_graph(&self, job_id: JobId, rows: &[BatchRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Database)?;

        for row in rows {
            let product =
                ProductRepo::insert(&mut *tx, job_id, row.serial_number, &row.product_name)
                    .await?;
            for url in &row.image_urls {
                UnitRepo::insert(&mut *tx, product.id, url).await?;
            }
        }
        JobRepo::mark_processing(&mut *tx, job_id).await?;

        tx.commit().await.map_err(StoreError::Database)?;
        Ok(())
    }

    async fn pending_units(&self, job_id: JobId) -> Result<Vec<DbId>, StoreError> {
        Ok(UnitRepo::pending_by_job(&self.pool, job_id).await?)
    }

    async fn stale_pending_units(
        &self,
        older_than_secs: i64,
        limit: i64,
    ) -> Result<Vec<PendingUnit>, StoreError> {
        Ok(UnitRepo::list_stale_pending(&self.pool, older_than_secs, limit).await?)
    }

    async fn claim_unit(&self, unit_id: DbId) -> Result<Option<Unit>, StoreError> {
        Ok(UnitRepo::claim_for_processing(&self.pool, unit_id).await?)
    }

    async fn complete_unit(&self, unit_id: DbId, output_url: &str) -> Result<(), StoreError> {
        Ok(UnitRepo::complete(&self.pool, unit_id, output_url).await?)
    }

    async fn fail_unit(&self, unit_id: DbId) -> Result<(), StoreError> {
        Ok(UnitRepo::fail(&self.pool, unit_id).await?)
    }

    async fn recount_job(&self, id: JobId) -> Result<Option<JobProgress>, StoreError> {
        Ok(JobRepo::recount_and_finalize(&self.pool, id).await?)
    }

    async fn set_notify_status(
        &self,
        id: JobId,
        status: NotifyStatus,
    ) -> Result<bool, StoreError> {
        Ok(JobRepo::set_notify_status(&self.pool, id, status).await?)
    }

    async fn report_rows(&self, id: JobId) -> Result<Vec<ReportRow>, StoreError> {
        let products = ProductRepo::list_by_job(&self.pool, id).await?;

        let mut rows = Vec::with_capacity(products.len());
        for product in products {
            let units = UnitRepo::list_by_product(&self.pool, product.id).await?;
            rows.push(ReportRow {
                serial_number: product.serial_number,
                product_name: product.product_name,
                input_urls: units.iter().map(|u| u.input_url.clone()).collect(),
                output_urls: units.into_iter().map(|u| u.output_url).collect(),
            });
        }
        Ok(rows)
    }
}
