//! Unit entity: one image reference and its processing lifecycle.

use batchpix_core::types::{DbId, JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{StatusId, UnitStatus};

/// A row from the `units` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Unit {
    pub id: DbId,
    pub product_id: DbId,
    pub input_url: String,
    /// Set only when the transform succeeded.
    pub output_url: Option<String>,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Unit {
    /// Typed view of `status_id`. Unknown discriminants cannot occur
    /// for rows written by this codebase.
    pub fn status(&self) -> UnitStatus {
        match self.status_id {
            1 => UnitStatus::Pending,
            2 => UnitStatus::Processing,
            3 => UnitStatus::Completed,
            _ => UnitStatus::Failed,
        }
    }
}

/// A pending unit awaiting dispatch, joined with its owning job.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct PendingUnit {
    pub unit_id: DbId,
    pub job_id: JobId,
}
