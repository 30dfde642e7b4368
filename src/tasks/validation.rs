use async_trait::async_trait;

use super::{hydrate, load_provider, reconcile::reconcile, Attempt, Task, TaskError};
use crate::app_state::TaskContext;
use crate::models::job::TaskName;
use crate::models::result::{StatusCode, TaskResult};
use crate::provider::ProviderOutput;
use crate::services::telemetry;

/// Judges a single enrolment sample. Takes no lock.
pub struct ValidationTask {
    attempt: Attempt,
    learner_id: String,
    sample_id: i64,
    validation_id: i64,
}

impl ValidationTask {
    pub fn new(attempt: Attempt, learner_id: String, sample_id: i64, validation_id: i64) -> Self {
        Self {
            attempt,
            learner_id,
            sample_id,
            validation_id,
        }
    }

    async fn set_status(&self, ctx: &TaskContext, status: StatusCode) -> Result<(), TaskError> {
        ctx.storage
            .set_sample_validation_status(
                ctx.provider_id,
                &self.learner_id,
                self.sample_id,
                self.validation_id,
                status,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Task for ValidationTask {
    fn name(&self) -> TaskName {
        TaskName::Validate
    }

    fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    async fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        let (provider, _) = load_provider(ctx).await?;

        let record = match ctx
            .storage
            .get_sample_validation(
                ctx.provider_id,
                &self.learner_id,
                self.sample_id,
                self.validation_id,
            )
            .await
        {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                return Err(TaskError::Reject("Sample validation not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let sample = hydrate::hydrate_sample(ctx, &self.attempt, &record.sample, false).await?;

        let ProviderOutput {
            result,
            notifications,
            delayed_results,
        } = provider
            .validate_sample(sample, self.validation_id)
            .await
            .map_err(TaskError::from_provider)?;

        match result {
            TaskResult::Validation(result) => {
                ctx.storage
                    .set_sample_validation(
                        ctx.provider_id,
                        &self.learner_id,
                        self.sample_id,
                        self.validation_id,
                        &result,
                    )
                    .await?;
            }
            TaskResult::ValidationDelayed(_) => {
                self.set_status(ctx, StatusCode::WaitingExternalService).await?;
            }
            other => {
                let violation = TaskError::ContractViolation {
                    task: TaskName::Validate,
                    found: other.kind(),
                };
                telemetry::capture(TaskName::Validate, &self.attempt.job_id, &violation);
                self.set_status(ctx, StatusCode::Error).await?;
            }
        }

        telemetry::trace(
            ctx.trace,
            TaskName::Validate,
            &self.attempt.job_id,
            "Sending delayed results and notifications",
        );
        reconcile(ctx, delayed_results, notifications).await?;
        Ok(())
    }
}
