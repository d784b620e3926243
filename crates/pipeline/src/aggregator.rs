//! Completion fan-in: recount after every unit outcome, trigger the
//! webhook exactly once.
//!
//! [`settle_job`] is called after each unit reaches a terminal state
//! (and once at decomposition for empty batches). The store's recount
//! is serialized, so however many units finish concurrently, only one
//! caller observes `newly_completed` and spawns the delivery.

use std::sync::Arc;

use batchpix_core::types::JobId;
use batchpix_db::models::job::Job;
use batchpix_db::models::status::NotifyStatus;
use batchpix_events::{CompletionPayload, DeliveryStatusSink, WebhookNotifier};

use crate::store::BatchStore;

/// Builds completion payloads and owns the delivery machinery.
pub struct Notifier {
    webhook: WebhookNotifier,
    base_url: String,
}

impl Notifier {
    pub fn new(webhook: WebhookNotifier, base_url: &str) -> Self {
        Self {
            webhook,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Public download URL for a job's result report.
    pub fn results_url(&self, job_id: JobId) -> String {
        format!("{}/api/v1/batches/{}/results", self.base_url, job_id)
    }

    fn payload_for(&self, job: &Job) -> CompletionPayload {
        CompletionPayload {
            job_id: job.id,
            status: job.status().as_str().to_string(),
            total_units: job.total_units,
            completed_units: job.completed_units,
            completion_time: job.updated_at,
            results_csv_url: self.results_url(job.id),
        }
    }
}

/// [`DeliveryStatusSink`] persisting delivery outcomes to the job row.
///
/// Store failures are logged, never propagated: a status write must not
/// abort the retry sequence.
struct StoreSink {
    store: Arc<dyn BatchStore>,
}

#[async_trait::async_trait]
impl DeliveryStatusSink for StoreSink {
    async fn mark_sent(&self, job_id: JobId) {
        if let Err(e) = self.store.set_notify_status(job_id, NotifyStatus::Sent).await {
            tracing::error!(%job_id, error = %e, "Failed to record webhook sent status");
        }
    }

    async fn mark_failed(&self, job_id: JobId) {
        if let Err(e) = self
            .store
            .set_notify_status(job_id, NotifyStatus::Failed)
            .await
        {
            tracing::error!(%job_id, error = %e, "Failed to record webhook failed status");
        }
    }
}

/// Recount the job and, on the terminal transition, fire its webhook.
///
/// Safe to call any number of times from any worker: the recount makes
/// the Processing -> Completed transition observable exactly once, and
/// the delivery (with its minutes-long backoff) runs on its own task so
/// the calling worker is never held up.
pub async fn settle_job(store: Arc<dyn BatchStore>, notifier: Arc<Notifier>, job_id: JobId) {
    let progress = match store.recount_job(job_id).await {
        Ok(Some(progress)) => progress,
        Ok(None) => {
            tracing::warn!(%job_id, "Recount for unknown job");
            return;
        }
        Err(e) => {
            tracing::error!(%job_id, error = %e, "Job recount failed");
            return;
        }
    };

    if !progress.newly_completed {
        return;
    }
    tracing::info!(
        %job_id,
        total_units = progress.job.total_units,
        "Job completed"
    );

    if !progress.job.notification_armed() {
        return;
    }
    let Some(url) = progress.job.notify_url.clone() else {
        return;
    };
    let payload = notifier.payload_for(&progress.job);

    tokio::spawn(async move {
        let sink = StoreSink { store };
        // Outcome already recorded through the sink; error logged by
        // the notifier itself.
        let _ = notifier.webhook.deliver(&url, &payload, &sink).await;
    });
}
