//! Job handlers: one state machine per job kind, plus the shared failure
//! hook, data hydration and reconciliation of provider side outputs.

mod enrolment;
mod hydrate;
mod lock;
mod notification;
mod reconcile;
pub mod state;
mod validation;
mod verification;

pub use enrolment::EnrolmentTask;
pub use lock::ModelLock;
pub use notification::NotificationTask;
pub use state::EnrolmentState;
pub use validation::ValidationTask;
pub use verification::VerificationTask;

use async_trait::async_trait;
use garde::Validate;
use std::time::Duration;

use crate::app_state::TaskContext;
use crate::models::job::{JobKind, TaskName};
use crate::provider::{Provider, ProviderDescriptor, ProviderError};
use crate::services::{api::ApiError, blobs::BlobError, queue::QueuedJob, telemetry};

/// Backoff while another job holds the learner model.
pub const LOCK_RETRY_COUNTDOWN: Duration = Duration::from_secs(30);
pub const LOCK_MAX_RETRIES: u32 = 10;

/// Backoff after a failed blob download.
pub const BLOB_RETRY_COUNTDOWN: Duration = Duration::from_secs(5 * 60);
pub const BLOB_MAX_RETRIES: u32 = 3;

/// Backoff while the learner model cannot be analysed yet.
pub const MODEL_RETRY_COUNTDOWN: Duration = Duration::from_secs(120);
pub const MODEL_MAX_RETRIES: u32 = 3;

/// Identity of one dispatch of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub job_id: String,
    /// Times this job was re-dispatched before this attempt.
    pub retries: u32,
}

impl Attempt {
    pub fn new(job_id: impl Into<String>, retries: u32) -> Self {
        Self {
            job_id: job_id.into(),
            retries,
        }
    }
}

impl From<&QueuedJob> for Attempt {
    fn from(job: &QueuedJob) -> Self {
        Self::new(job.job_id.to_string(), job.retries)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Retry requested: {reason}")]
    Retry { countdown: Duration, reason: String },

    #[error("Maximum retries ({retries}) exceeded: {reason}")]
    MaxRetriesExceeded { retries: u32, reason: String },

    #[error("{0}")]
    Reject(String),

    #[error("Method not implemented on provider: {0}")]
    NotImplemented(&'static str),

    #[error("Unexpected result type in {task}: {found}")]
    ContractViolation { task: TaskName, found: &'static str },

    #[error("Storage API error: {0}")]
    Api(#[from] ApiError),

    #[error("Blob download error: {0}")]
    Blob(#[from] BlobError),

    #[error("Provider error: {0}")]
    Provider(ProviderError),
}

impl TaskError {
    /// Ask the runtime to dispatch the job again after `countdown`, unless
    /// it has already been retried `max_retries` times.
    pub fn retry(
        attempt: &Attempt,
        countdown: Duration,
        max_retries: u32,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        if attempt.retries >= max_retries {
            TaskError::MaxRetriesExceeded {
                retries: attempt.retries,
                reason,
            }
        } else {
            TaskError::Retry { countdown, reason }
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, TaskError::Retry { .. })
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, TaskError::Reject(_))
    }

    /// Delay before the next dispatch, for retry requests.
    pub fn countdown(&self) -> Option<Duration> {
        match self {
            TaskError::Retry { countdown, .. } => Some(*countdown),
            _ => None,
        }
    }

    /// Map a fault raised inside a capability call.
    pub(crate) fn from_provider(error: ProviderError) -> Self {
        match error {
            ProviderError::NotImplemented(method) => TaskError::NotImplemented(method),
            ProviderError::Fault(message) => {
                TaskError::Reject(format!("Exception from provider: {message}"))
            }
            other => TaskError::Provider(other),
        }
    }
}

/// One job handler.
#[async_trait]
pub trait Task: Send {
    fn name(&self) -> TaskName;

    fn attempt(&self) -> &Attempt;

    async fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError>;

    /// Runs after `run` fails, retries included.
    async fn on_failure(&mut self, ctx: &TaskContext, error: &TaskError) {
        let _ = (ctx, error);
    }
}

/// Run a task through the failure hook. Faults are captured once, before
/// the caller decides what to do with the job; retry requests are not
/// faults.
pub async fn execute<T: Task + ?Sized>(task: &mut T, ctx: &TaskContext) -> Result<(), TaskError> {
    let name = task.name();
    let job_id = task.attempt().job_id.clone();
    telemetry::trace(ctx.trace, name, &job_id, "Task started");

    match task.run(ctx).await {
        Ok(()) => {
            telemetry::trace(ctx.trace, name, &job_id, "Task finished");
            Ok(())
        }
        Err(error) => {
            if !error.is_retry() {
                telemetry::capture(name, &job_id, &error);
            }
            task.on_failure(ctx, &error).await;
            Err(error)
        }
    }
}

/// Route a dequeued job to its handler.
pub async fn dispatch(ctx: &TaskContext, job: &QueuedJob) -> Result<(), TaskError> {
    let attempt = Attempt::from(job);
    match &job.task {
        JobKind::Enrol {
            learner_id,
            sample_id,
        } => {
            let mut task = EnrolmentTask::new(attempt, learner_id.clone(), *sample_id);
            execute(&mut task, ctx).await
        }
        JobKind::Validate {
            learner_id,
            sample_id,
            validation_id,
        } => {
            let mut task =
                ValidationTask::new(attempt, learner_id.clone(), *sample_id, *validation_id);
            execute(&mut task, ctx).await
        }
        JobKind::Verify {
            request_id,
            result_id,
        } => {
            let mut task = VerificationTask::new(attempt, *request_id, *result_id);
            execute(&mut task, ctx).await
        }
        JobKind::Notify { notification_id } => {
            let mut task = NotificationTask::new(attempt, *notification_id);
            execute(&mut task, ctx).await
        }
    }
}

/// Fresh provider instance configured with the stored descriptor.
pub(crate) async fn load_provider(
    ctx: &TaskContext,
) -> Result<(Box<dyn Provider>, ProviderDescriptor), TaskError> {
    let descriptor = ctx.storage.get_provider(ctx.provider_id).await?;
    descriptor
        .validate()
        .map_err(|e| TaskError::Provider(ProviderError::Config(e.to_string())))?;

    let mut provider = (ctx.provider)();
    provider
        .configure(&descriptor)
        .map_err(TaskError::Provider)?;
    Ok((provider, descriptor))
}
