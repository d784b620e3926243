//! Handlers for batch submission, status polling, and result download.

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use batchpix_core::error::CoreError;
use batchpix_core::intake;
use batchpix_core::types::{JobId, Timestamp};
use batchpix_db::models::status::JobStatus;
use batchpix_pipeline::exporter::ExportError;
use batchpix_pipeline::{decomposer, dispatcher, exporter};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Typed response for the batch submission endpoint.
#[derive(Debug, Serialize)]
pub struct SubmitResult {
    pub job_id: JobId,
    pub status: &'static str,
    pub total_units: i32,
}

/// Typed response for the job status endpoint.
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: &'static str,
    pub total_units: i32,
    pub completed_units: i32,
    pub completion_percentage: f64,
    pub webhook_status: Option<&'static str>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ── Submit ──────────────────────────────────────────────────────────

/// POST /api/v1/batches
///
/// Accept a multipart upload with a `file` part (the batch CSV) and an
/// optional `webhook_url` part. Validates, decomposes, and queues the
/// whole batch before answering 202 with the job ID.
pub async fn submit_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SubmitResult>>)> {
    let mut file: Option<Vec<u8>> = None;
    let mut webhook_url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                file = Some(bytes.to_vec());
            }
            Some("webhook_url") => {
                let url = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read webhook_url: {e}")))?;
                let url = url.trim().to_string();
                if !url.is_empty() {
                    webhook_url = Some(url);
                }
            }
            // Unknown parts are ignored.
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("Missing 'file' part".to_string()))?;
    if let Some(url) = &webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::BadRequest(
                "webhook_url must be an http(s) URL".to_string(),
            ));
        }
    }

    let batch = intake::parse_batch(&file)?;
    let job = decomposer::decompose(
        &state.store,
        &state.notifier,
        &batch,
        webhook_url.as_deref(),
    )
    .await?;
    dispatcher::dispatch_job(state.store.as_ref(), &state.workers, job.id).await?;

    tracing::info!(job_id = %job.id, units = job.total_units, "Batch accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmitResult {
                job_id: job.id,
                status: job.status().as_str(),
                total_units: job.total_units,
            },
        }),
    ))
}

// ── Status ──────────────────────────────────────────────────────────

/// GET /api/v1/batches/{id}
///
/// Current job progress. `webhook_status` may transiently read
/// `failed` while a delivery retry is still pending.
pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<DataResponse<JobStatusView>>> {
    let job = state
        .store
        .find_job(id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;

    let completion_percentage = if job.total_units > 0 {
        f64::from(job.completed_units) * 100.0 / f64::from(job.total_units)
    } else {
        100.0
    };

    Ok(Json(DataResponse {
        data: JobStatusView {
            job_id: job.id,
            status: job.status().as_str(),
            total_units: job.total_units,
            completed_units: job.completed_units,
            completion_percentage,
            webhook_status: job.notify_status().map(|s| s.as_str()),
            created_at: job.created_at,
            updated_at: job.updated_at,
        },
    }))
}

// ── Results ─────────────────────────────────────────────────────────

/// GET /api/v1/batches/{id}/results
///
/// Download the result report as a CSV attachment. Answers 409 until
/// the job has completed.
pub async fn download_results(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Response> {
    let job = state
        .store
        .find_job(id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;
    if job.status() != JobStatus::Completed {
        return Err(AppError::NotReady(format!(
            "Job {} is still {}",
            job.id,
            job.status().as_str()
        )));
    }

    let csv = exporter::export_report(state.store.as_ref(), id)
        .await
        .map_err(|e| match e {
            ExportError::Store(e) => AppError::Store(e),
            ExportError::Render(e) => AppError::Core(e),
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"results-{id}.csv\""),
            ),
        ],
        csv,
    )
        .into_response())
}
