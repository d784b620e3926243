//! Task fan-out: hand pending units to the worker pool.
//!
//! [`dispatch_job`] queues a job's pending units right after
//! decomposition. [`run_rescan_loop`] is the crash-recovery path: it
//! periodically re-queues units that have sat `pending` longer than a
//! threshold (dispatched before a restart, or dropped on the floor).
//! Re-dispatching an already-claimed unit is harmless since the claim
//! is guarded.

use std::sync::Arc;
use std::time::Duration;

use batchpix_core::types::JobId;
use tokio_util::sync::CancellationToken;

use crate::pool::{UnitTask, WorkerPool};
use crate::store::{BatchStore, StoreError};

/// Maximum stale units re-queued per rescan tick.
const RESCAN_BATCH_LIMIT: i64 = 256;

/// Error type for dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The worker pool has been shut down.
    #[error("Worker queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Queue every pending unit of `job_id`. Returns how many were queued.
pub async fn dispatch_job(
    store: &dyn BatchStore,
    pool: &WorkerPool,
    job_id: JobId,
) -> Result<usize, DispatchError> {
    let unit_ids = store.pending_units(job_id).await?;
    let count = unit_ids.len();
    for unit_id in unit_ids {
        pool.submit(UnitTask { unit_id, job_id }).await?;
    }
    tracing::info!(%job_id, units = count, "Dispatched job units");
    Ok(count)
}

/// Periodically re-queue stale pending units until cancelled.
pub async fn run_rescan_loop(
    store: Arc<dyn BatchStore>,
    pool: Arc<WorkerPool>,
    interval: Duration,
    min_age_secs: i64,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The immediate first tick doubles as startup recovery.
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Rescan loop stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        let stale = match store
            .stale_pending_units(min_age_secs, RESCAN_BATCH_LIMIT)
            .await
        {
            Ok(stale) => stale,
            Err(e) => {
                tracing::error!(error = %e, "Stale unit scan failed");
                continue;
            }
        };
        if stale.is_empty() {
            continue;
        }

        tracing::info!(count = stale.len(), "Re-queueing stale pending units");
        for pending in stale {
            let task = UnitTask {
                unit_id: pending.unit_id,
                job_id: pending.job_id,
            };
            if pool.submit(task).await.is_err() {
                tracing::warn!("Worker queue closed, stopping rescan loop");
                return;
            }
        }
    }
}
