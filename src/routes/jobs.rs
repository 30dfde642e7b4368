use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::job::{SubmitJobRequest, SubmitJobResponse};
use crate::services::queue::QueuedJob;

/// POST /api/v1/jobs: enqueue a job on one of the consumed queues.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), StatusCode> {
    if let Err(report) = request.validate() {
        tracing::info!(error = %report, "Rejected invalid job submission");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let queue = state.queue(request.queue.as_deref()).ok_or_else(|| {
        tracing::info!(queue = ?request.queue, "Job submitted to unknown queue");
        StatusCode::NOT_FOUND
    })?;

    let job = QueuedJob::new(request.job);
    queue.enqueue(&job).await.map_err(|e| {
        tracing::error!(job_id = %job.job_id, error = %e, "Failed to enqueue job");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    metrics::counter!("provider_jobs_submitted_total", "task" => job.name().to_string())
        .increment(1);
    tracing::info!(job_id = %job.job_id, task = %job.name(), queue = queue.name(), "Job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.job_id,
            task: job.name(),
            queue: queue.name().to_string(),
        }),
    ))
}
