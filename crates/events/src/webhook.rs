//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookNotifier`] sends a JSON-encoded [`CompletionPayload`] to an
//! external URL via HTTP POST. The payload is serialized once and every
//! attempt resends the identical bytes; when a signing secret is
//! configured, an HMAC-SHA256 signature over those exact bytes is
//! attached as a header.
//!
//! Delivery status is written through a [`DeliveryStatusSink`] as the
//! state machine advances: `failed` is recorded optimistically before
//! each retry is scheduled and again on exhaustion, `sent` on the first
//! 2xx response. A caller polling job status mid-sequence may therefore
//! transiently observe `failed` while a retry is still pending.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use batchpix_core::signing::{compute_webhook_hmac, SIGNATURE_HEADER};
use batchpix_core::types::{JobId, Timestamp};
use serde::Serialize;

/// Retries after the initial attempt (4 attempts total).
const MAX_RETRIES: u32 = 3;

/// Base backoff delay; attempt `n` waits `60 × 2^n` seconds
/// (60 s, 120 s, 240 s).
const RETRY_BASE_DELAY: Duration = Duration::from_secs(60);

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The JSON body delivered to a job's webhook URL on completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub job_id: JobId,
    /// Wire name of the job status (always `"completed"` in practice).
    pub status: String,
    pub total_units: i32,
    pub completed_units: i32,
    /// When the job reached its terminal state.
    pub completion_time: Timestamp,
    /// Where the exported result report can be downloaded.
    pub results_csv_url: String,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),

    /// The payload could not be serialized.
    #[error("Payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Capability boundaries
// ---------------------------------------------------------------------------

/// The HTTP POST capability used for delivery. Mocked in tests.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Execute one POST of `body` to `url`, attaching the signature
    /// header when given. Must return an error on non-2xx responses.
    async fn post(
        &self,
        url: &str,
        signature: Option<&str>,
        body: &str,
    ) -> Result<(), WebhookError>;
}

/// Where delivery outcomes are recorded (the job's notify status).
///
/// Implementations persist the transition and log their own errors; a
/// failed status write must not abort the delivery sequence.
#[async_trait]
pub trait DeliveryStatusSink: Send + Sync {
    async fn mark_sent(&self, job_id: JobId);
    async fn mark_failed(&self, job_id: JobId);
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// `reqwest`-backed [`WebhookTransport`] with a per-attempt timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        signature: Option<&str>,
        body: &str,
    ) -> Result<(), WebhookError> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(sig) = signature {
            request = request.header(SIGNATURE_HEADER, sig);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// Delivers completion payloads with signing and bounded retry.
pub struct WebhookNotifier {
    transport: Arc<dyn WebhookTransport>,
    secret: Option<String>,
}

impl WebhookNotifier {
    /// Create a notifier using the real HTTP transport. No signature
    /// header is sent when `secret` is `None`.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            transport: Arc::new(HttpTransport::new()),
            secret,
        }
    }

    /// Create a notifier over a custom transport (tests).
    pub fn with_transport(transport: Arc<dyn WebhookTransport>, secret: Option<String>) -> Self {
        Self { transport, secret }
    }

    /// Deliver `payload` to `url`, retrying with exponential backoff.
    ///
    /// Attempt sequence: initial send plus up to [`MAX_RETRIES`]
    /// retries, waiting `60 × 2^attempt` seconds after each failure.
    /// The sink sees `mark_failed` after every failed attempt and
    /// `mark_sent` once on success; after exhaustion the last error is
    /// returned and no further attempts occur.
    pub async fn deliver(
        &self,
        url: &str,
        payload: &CompletionPayload,
        sink: &dyn DeliveryStatusSink,
    ) -> Result<(), WebhookError> {
        // Serialize once: every retry resends the identical bytes, and
        // the signature covers exactly what goes on the wire.
        let body = serde_json::to_string(payload)?;
        let signature = self
            .secret
            .as_deref()
            .map(|secret| compute_webhook_hmac(secret, body.as_bytes()));

        for attempt in 0..=MAX_RETRIES {
            match self.transport.post(url, signature.as_deref(), &body).await {
                Ok(()) => {
                    tracing::info!(job_id = %payload.job_id, url, attempt, "Webhook delivered");
                    sink.mark_sent(payload.job_id).await;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %payload.job_id,
                        url,
                        attempt,
                        error = %e,
                        "Webhook delivery attempt failed"
                    );
                    sink.mark_failed(payload.job_id).await;

                    if attempt == MAX_RETRIES {
                        tracing::error!(
                            job_id = %payload.job_id,
                            url,
                            "Webhook delivery failed after all retries"
                        );
                        return Err(e);
                    }

                    tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt)).await;
                }
            }
        }
        unreachable!("loop returns on success or exhaustion");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;
    use tokio::time::Instant;
    use uuid::Uuid;

    /// Transport that pops scripted outcomes and records attempt times.
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<(), u16>>>,
        attempts: Mutex<Vec<(Instant, Option<String>, String)>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<(), u16>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                attempts: Mutex::new(Vec::new()),
            })
        }

        async fn attempt_count(&self) -> usize {
            self.attempts.lock().await.len()
        }
    }

    #[async_trait]
    impl WebhookTransport for ScriptedTransport {
        async fn post(
            &self,
            _url: &str,
            signature: Option<&str>,
            body: &str,
        ) -> Result<(), WebhookError> {
            self.attempts.lock().await.push((
                Instant::now(),
                signature.map(str::to_string),
                body.to_string(),
            ));
            match self.outcomes.lock().await.pop_front() {
                Some(Ok(())) | None => Ok(()),
                Some(Err(code)) => Err(WebhookError::HttpStatus(code)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        transitions: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl DeliveryStatusSink for RecordingSink {
        async fn mark_sent(&self, _job_id: JobId) {
            self.transitions.lock().await.push("sent");
        }
        async fn mark_failed(&self, _job_id: JobId) {
            self.transitions.lock().await.push("failed");
        }
    }

    fn payload() -> CompletionPayload {
        CompletionPayload {
            job_id: Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
            status: "completed".to_string(),
            total_units: 4,
            completed_units: 4,
            completion_time: chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            results_csv_url:
                "http://localhost:3000/api/v1/batches/00000000-0000-0000-0000-000000000001/results"
                    .to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_fourth_attempt_with_backoff_delays() {
        let transport =
            ScriptedTransport::new(vec![Err(502), Err(502), Err(502), Ok(())]);
        let notifier = WebhookNotifier::with_transport(transport.clone(), None);
        let sink = RecordingSink::default();

        notifier
            .deliver("http://callback.example/hook", &payload(), &sink)
            .await
            .expect("fourth attempt should succeed");

        let attempts = transport.attempts.lock().await;
        assert_eq!(attempts.len(), 4);

        // Gaps between attempts: 60 s, 120 s, 240 s.
        let gaps: Vec<u64> = attempts
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).as_secs())
            .collect();
        assert_eq!(gaps, vec![60, 120, 240]);

        // Every retry resends the identical payload bytes.
        assert!(attempts.iter().all(|(_, _, body)| *body == attempts[0].2));

        // Status flaps to failed after each miss, then ends sent.
        let transitions = sink.transitions.lock().await;
        assert_eq!(*transitions, vec!["failed", "failed", "failed", "sent"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_ends_failed_with_exactly_four_attempts() {
        let transport =
            ScriptedTransport::new(vec![Err(500), Err(500), Err(500), Err(500)]);
        let notifier = WebhookNotifier::with_transport(transport.clone(), None);
        let sink = RecordingSink::default();

        let result = notifier
            .deliver("http://callback.example/hook", &payload(), &sink)
            .await;
        assert!(matches!(result, Err(WebhookError::HttpStatus(500))));
        assert_eq!(transport.attempt_count().await, 4);

        let transitions = sink.transitions.lock().await;
        assert_eq!(*transitions, vec!["failed"; 4]);

        // No further attempts after exhaustion.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(transport.attempt_count().await, 4);
    }

    #[tokio::test]
    async fn signature_covers_exact_serialized_bytes() {
        let transport = ScriptedTransport::new(vec![Ok(())]);
        let notifier =
            WebhookNotifier::with_transport(transport.clone(), Some("s3cret".to_string()));
        let sink = RecordingSink::default();

        notifier
            .deliver("http://callback.example/hook", &payload(), &sink)
            .await
            .unwrap();

        let attempts = transport.attempts.lock().await;
        let (_, signature, body) = &attempts[0];
        assert_eq!(
            body.as_str(),
            "{\"job_id\":\"00000000-0000-0000-0000-000000000001\",\
             \"status\":\"completed\",\"total_units\":4,\"completed_units\":4,\
             \"completion_time\":\"2026-01-02T03:04:05Z\",\
             \"results_csv_url\":\"http://localhost:3000/api/v1/batches/\
             00000000-0000-0000-0000-000000000001/results\"}"
        );
        assert_eq!(
            signature.as_deref(),
            Some("bc262a3fdbe0290a561bee077a5b07f5b21aea70c1f5f028eb58eaaf0b409141")
        );
        assert_eq!(
            signature.as_deref().unwrap(),
            compute_webhook_hmac("s3cret", body.as_bytes())
        );
    }

    #[tokio::test]
    async fn no_secret_means_no_signature_header() {
        let transport = ScriptedTransport::new(vec![Ok(())]);
        let notifier = WebhookNotifier::with_transport(transport.clone(), None);
        let sink = RecordingSink::default();

        notifier
            .deliver("http://callback.example/hook", &payload(), &sink)
            .await
            .unwrap();

        let attempts = transport.attempts.lock().await;
        assert!(attempts[0].1.is_none());
    }
}
