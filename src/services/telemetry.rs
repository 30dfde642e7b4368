//! Observability hooks shared by every task.

use crate::models::job::TaskName;

/// Record a fault raised while running `task`. Every fault goes through here
/// before the worker decides what to do with the job.
pub fn capture(task: TaskName, job_id: &str, error: &(dyn std::error::Error + 'static)) {
    tracing::error!(task = %task, job_id = job_id, error = %error, "Task exception captured");
    metrics::counter!("provider_task_exceptions_total", "task" => task.to_string()).increment(1);
}

/// Task trace message, promoted to `info` when task tracing is enabled.
pub fn trace(enabled: bool, task: TaskName, job_id: &str, message: &str) {
    if enabled {
        tracing::info!(task = %task, job_id = job_id, "{}", message);
    } else {
        tracing::debug!(task = %task, job_id = job_id, "{}", message);
    }
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "provider_jobs_submitted_total",
        "Total provider jobs submitted over HTTP"
    );
    metrics::describe_counter!(
        "provider_jobs_completed_total",
        "Total provider jobs completed"
    );
    metrics::describe_counter!(
        "provider_jobs_retried_total",
        "Total provider jobs re-dispatched after a retry request"
    );
    metrics::describe_counter!(
        "provider_jobs_rejected_total",
        "Total provider jobs rejected permanently"
    );
    metrics::describe_counter!(
        "provider_jobs_failed_total",
        "Total provider jobs that failed fatally"
    );
    metrics::describe_counter!(
        "provider_task_exceptions_total",
        "Faults captured while running provider tasks"
    );
    metrics::describe_histogram!(
        "provider_job_duration_seconds",
        "Time to run one provider job"
    );
    metrics::describe_gauge!(
        "provider_queue_depth",
        "Jobs waiting in the queue, including delayed retries"
    );
}
