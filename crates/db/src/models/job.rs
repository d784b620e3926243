//! Job entity: one row per submitted batch.

use batchpix_core::types::{JobId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{JobStatus, NotifyStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status_id: StatusId,
    /// Frozen at decomposition time; never changes afterward.
    pub total_units: i32,
    /// Count of terminal units (completed or failed).
    pub completed_units: i32,
    pub notify_url: Option<String>,
    /// Present iff `notify_url` is set.
    pub notify_status_id: Option<StatusId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Typed view of `status_id`. Unknown discriminants fall back to
    /// `Pending` (cannot occur for rows written by this codebase).
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Pending)
    }

    /// Typed view of `notify_status_id`.
    pub fn notify_status(&self) -> Option<NotifyStatus> {
        self.notify_status_id.and_then(NotifyStatus::from_id)
    }

    /// Whether the completion notification should fire for this job:
    /// a webhook URL is configured and the status is still armed.
    pub fn notification_armed(&self) -> bool {
        self.notify_url.is_some() && self.notify_status() == Some(NotifyStatus::NotSent)
    }
}

/// Outcome of a completion recount for a job.
#[derive(Debug, Clone)]
pub struct JobProgress {
    /// The job row after the recount was applied.
    pub job: Job,
    /// True exactly once per job: this recount performed the
    /// Processing -> Completed transition.
    pub newly_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(status: JobStatus, notify: Option<(&str, NotifyStatus)>) -> Job {
        Job {
            id: uuid::Uuid::nil(),
            status_id: status.id(),
            total_units: 2,
            completed_units: 0,
            notify_url: notify.map(|(u, _)| u.to_string()),
            notify_status_id: notify.map(|(_, s)| s.id()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn notification_armed_requires_url_and_not_sent() {
        assert!(job(JobStatus::Completed, Some(("http://cb", NotifyStatus::NotSent)))
            .notification_armed());
        assert!(!job(JobStatus::Completed, Some(("http://cb", NotifyStatus::Sent)))
            .notification_armed());
        assert!(!job(JobStatus::Completed, None).notification_armed());
    }

    #[test]
    fn typed_status_views() {
        let j = job(JobStatus::Processing, None);
        assert_eq!(j.status(), JobStatus::Processing);
        assert_eq!(j.notify_status(), None);
    }
}
