use instrument_provider::{
    app_state::TaskContext,
    config::AppConfig,
    provider::ProviderRegistry,
    services::{
        api_client::ApiClient,
        blobs::HttpBlobClient,
        queue::{JobQueue, QueuedJob},
        telemetry,
    },
    tasks::{self, TaskError},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting instrument provider worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Job and task metrics are recorded here, so this process serves its own
    // scrape endpoint.
    let metrics_addr = config
        .metrics_socket_addr()
        .expect("METRICS_ADDR is not a socket address");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus exporter");
    telemetry::describe_metrics();
    tracing::info!(%metrics_addr, "Worker metrics exporter listening");

    let registry = ProviderRegistry::with_defaults();
    let factory = registry.resolve(&config.provider).unwrap_or_else(|e| {
        tracing::error!(error = %e, available = ?registry.names(), "Provider is not registered");
        std::process::exit(1);
    });

    // Initialize services
    tracing::info!("Initializing services");
    let storage = ApiClient::new(&config.api_url, config.api_token.clone(), config.ssl_verify)
        .expect("Failed to initialize storage API client");
    let blobs = HttpBlobClient::new(config.ssl_verify).expect("Failed to initialize blob client");

    let queues = config
        .queues()
        .iter()
        .map(|name| JobQueue::new(&config.redis_url, name))
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to initialize job queue");

    let ctx = TaskContext::new(
        config.provider_id,
        Arc::new(storage),
        Arc::new(blobs),
        factory,
    )
    .with_trace(config.log_task_trace);

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    tracing::info!(
        provider = %config.provider,
        queues = ?config.queues(),
        "Worker ready, starting job processing loop"
    );

    // Main processing loop
    loop {
        let mut processed = false;
        for queue in &queues {
            match process_next_job(&ctx, queue).await {
                Ok(true) => processed = true,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(queue = queue.name(), error = %e, "Error polling queue");
                }
            }
        }

        if !processed {
            tracing::trace!("No jobs available, sleeping");
            sleep(poll_interval).await;
        }
    }
}

/// Process the next job from `queue`.
/// Returns Ok(true) if a job was processed, Ok(false) if no job available.
async fn process_next_job(
    ctx: &TaskContext,
    queue: &JobQueue,
) -> Result<bool, Box<dyn std::error::Error>> {
    let job = match queue.dequeue().await? {
        Some(j) => j,
        None => return Ok(false),
    };

    tracing::info!(
        job_id = %job.job_id,
        task = %job.name(),
        retries = job.retries,
        "Processing provider job"
    );

    let start = Instant::now();
    let outcome = tasks::dispatch(ctx, &job).await;
    metrics::histogram!("provider_job_duration_seconds", "task" => job.name().to_string())
        .record(start.elapsed().as_secs_f64());

    settle(queue, &job, outcome).await?;
    Ok(true)
}

/// Apply the runtime's side of a job outcome: reschedule, drop or finish.
async fn settle(
    queue: &JobQueue,
    job: &QueuedJob,
    outcome: Result<(), TaskError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = job.name().to_string();
    match outcome {
        Ok(()) => {
            metrics::counter!("provider_jobs_completed_total", "task" => task).increment(1);
            tracing::info!(job_id = %job.job_id, "Job completed successfully");
        }
        Err(TaskError::Retry { countdown, reason }) => {
            let next = job.next_attempt();
            queue.schedule(&next, countdown).await?;
            metrics::counter!("provider_jobs_retried_total", "task" => task).increment(1);
            tracing::info!(
                job_id = %job.job_id,
                retries = next.retries,
                countdown_secs = countdown.as_secs(),
                reason = %reason,
                "Job re-dispatched for retry"
            );
        }
        Err(TaskError::Reject(reason)) => {
            metrics::counter!("provider_jobs_rejected_total", "task" => task).increment(1);
            tracing::warn!(job_id = %job.job_id, reason = %reason, "Job rejected");
        }
        Err(e) => {
            metrics::counter!("provider_jobs_failed_total", "task" => task).increment(1);
            tracing::error!(job_id = %job.job_id, error = %e, "Job failed");
        }
    }

    queue.complete(job).await?;
    Ok(())
}
