//! Result export: assemble and render the output report for a job.

use batchpix_core::error::CoreError;
use batchpix_core::types::JobId;

use crate::store::{BatchStore, StoreError};

/// Error type for report export failures.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] CoreError),
}

/// Render the result report for `job_id` as CSV text.
///
/// Rows are ordered by the declared serial numbers; failed units keep
/// their position with an empty output cell. Deterministic: the same
/// job always renders byte-identical output.
pub async fn export_report(store: &dyn BatchStore, job_id: JobId) -> Result<String, ExportError> {
    let rows = store.report_rows(job_id).await?;
    Ok(batchpix_core::report::render_report(&rows)?)
}
