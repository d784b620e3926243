//! Per-unit processing: claim, transform, record the outcome, settle.
//!
//! Errors never propagate out of [`process_unit`]; every path ends with
//! the unit in a terminal state (or still claimable) and a recount so
//! the job's progress is always advanced.

use std::sync::Arc;

use crate::aggregator::{self, Notifier};
use crate::pool::UnitTask;
use crate::store::BatchStore;
use crate::transform::ImageTransformer;

/// Process one dispatched unit end to end.
///
/// The claim is the duplicate-dispatch guard: a unit that is no longer
/// `pending` (already claimed, or already terminal after a rescan
/// re-dispatch) is skipped without side effects.
pub async fn process_unit(
    store: Arc<dyn BatchStore>,
    transformer: Arc<dyn ImageTransformer>,
    notifier: Arc<Notifier>,
    task: UnitTask,
) {
    let unit = match store.claim_unit(task.unit_id).await {
        Ok(Some(unit)) => unit,
        Ok(None) => {
            tracing::debug!(unit_id = task.unit_id, "Unit no longer pending, skipping");
            return;
        }
        Err(e) => {
            tracing::error!(unit_id = task.unit_id, error = %e, "Unit claim failed");
            return;
        }
    };

    match transformer.transform(&unit.input_url).await {
        Ok(output_url) => {
            tracing::debug!(unit_id = unit.id, output_url, "Unit transformed");
            if let Err(e) = store.complete_unit(unit.id, &output_url).await {
                tracing::error!(unit_id = unit.id, error = %e, "Failed to record unit success");
                // The output exists but can't be recorded; fail the
                // unit so the job still terminates.
                if let Err(e) = store.fail_unit(unit.id).await {
                    tracing::error!(unit_id = unit.id, error = %e, "Failed to fail unit");
                }
            }
        }
        Err(e) => {
            tracing::warn!(unit_id = unit.id, input_url = %unit.input_url, error = %e, "Unit transform failed");
            if let Err(e) = store.fail_unit(unit.id).await {
                tracing::error!(unit_id = unit.id, error = %e, "Failed to fail unit");
            }
        }
    }

    aggregator::settle_job(store, notifier, task.job_id).await;
}
