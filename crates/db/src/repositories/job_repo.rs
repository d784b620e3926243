//! Repository for the `jobs` table.
//!
//! The completion recount in [`JobRepo::recount_and_finalize`] is the
//! serialization point for concurrent unit completions: it runs inside
//! a single transaction holding a row lock on the job, so exactly one
//! caller observes the Processing -> Completed transition.

use batchpix_core::types::JobId;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::job::{Job, JobProgress};
use crate::models::status::{JobStatus, NotifyStatus, UnitStatus};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, status_id, total_units, completed_units, \
    notify_url, notify_status_id, created_at, updated_at";

/// Provides CRUD and aggregate operations for batch jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job with a frozen declared unit count.
    ///
    /// When `notify_url` is given the notification is armed as
    /// `not_sent`; otherwise both webhook columns stay NULL.
    pub async fn create(
        pool: &PgPool,
        notify_url: Option<&str>,
        total_units: i32,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (id, status_id, total_units, notify_url, notify_status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(Uuid::new_v4())
            .bind(JobStatus::Pending.id())
            .bind(total_units)
            .bind(notify_url)
            .bind(notify_url.map(|_| NotifyStatus::NotSent.id()))
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Advance a job to `processing`. Runs on the decomposition
    /// transaction so the graph insert and the transition commit
    /// together.
    pub async fn mark_processing(
        conn: &mut PgConnection,
        id: JobId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET status_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(JobStatus::Processing.id())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Recount terminal units for a job and finalize it if they all are.
    ///
    /// Locks the job row (`SELECT ... FOR UPDATE`), counts units in a
    /// terminal state, writes `completed_units`, and performs the
    /// `completed` transition when the count equals `total_units`.
    /// Returns `None` for an unknown job. `newly_completed` is true for
    /// exactly one caller per job, no matter how many units finish
    /// concurrently or how often the recount re-runs afterwards.
    pub async fn recount_and_finalize(
        pool: &PgPool,
        id: JobId,
    ) -> Result<Option<JobProgress>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE");
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(job) = job else {
            return Ok(None);
        };

        let terminal: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM units u \
             JOIN products p ON p.id = u.product_id \
             WHERE p.job_id = $1 AND u.status_id IN ($2, $3)",
        )
        .bind(id)
        .bind(UnitStatus::Completed.id())
        .bind(UnitStatus::Failed.id())
        .fetch_one(&mut *tx)
        .await?;
        let terminal = terminal as i32;

        let newly_completed =
            terminal == job.total_units && job.status_id != JobStatus::Completed.id();
        let status_id = if terminal == job.total_units {
            JobStatus::Completed.id()
        } else {
            job.status_id
        };

        let query = format!(
            "UPDATE jobs SET completed_units = $2, status_id = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(terminal)
            .bind(status_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(JobProgress {
            job,
            newly_completed,
        }))
    }

    /// Delete a job and, via cascade, any products and units already
    /// inserted for it. Used to roll back a failed decomposition.
    pub async fn delete(pool: &PgPool, id: JobId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record the webhook delivery status for a job.
    ///
    /// `sent` is terminal: once recorded it is never overwritten, and a
    /// job without an armed notification is never touched. Returns
    /// whether a row changed.
    pub async fn set_notify_status(
        pool: &PgPool,
        id: JobId,
        status: NotifyStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET notify_status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND notify_status_id IS NOT NULL AND notify_status_id <> $3",
        )
        .bind(id)
        .bind(status.id())
        .bind(NotifyStatus::Sent.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
