//! Batch decomposition: persist a validated batch as its job, product
//! and unit records.

use std::sync::Arc;

use batchpix_core::intake::ValidatedBatch;
use batchpix_db::models::job::Job;

use crate::aggregator::{self, Notifier};
use crate::store::{BatchStore, StoreError};

/// Persist `batch` as a new job graph and return the job, already
/// advanced to `processing`.
///
/// Decomposition is all-or-nothing: the graph insert runs in one
/// transaction, and if it fails the job row itself is removed so no
/// unit-less job lingers in `pending`. A batch with zero units (header
/// only) is settled immediately: it goes straight to `completed` and
/// its notification fires without any dispatch.
pub async fn decompose(
    store: &Arc<dyn BatchStore>,
    notifier: &Arc<Notifier>,
    batch: &ValidatedBatch,
    notify_url: Option<&str>,
) -> Result<Job, StoreError> {
    let job = store.create_job(notify_url, batch.total_units).await?;
    if let Err(e) = store.insert_graph(job.id, &batch.rows).await {
        tracing::error!(job_id = %job.id, error = %e, "Graph insert failed, rolling back job");
        if let Err(del) = store.delete_job(job.id).await {
            tracing::error!(job_id = %job.id, error = %del, "Failed to remove job after rollback");
        }
        return Err(e);
    }
    tracing::info!(
        job_id = %job.id,
        products = batch.rows.len(),
        units = batch.total_units,
        "Batch decomposed"
    );

    if batch.total_units == 0 {
        aggregator::settle_job(store.clone(), notifier.clone(), job.id).await;
    }

    store
        .find_job(job.id)
        .await?
        .ok_or_else(|| StoreError::Internal(format!("job {} vanished after insert", job.id)))
}
