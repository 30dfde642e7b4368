use async_trait::async_trait;

use super::{
    hydrate, load_provider, reconcile::reconcile, Attempt, Task, TaskError, MODEL_MAX_RETRIES,
    MODEL_RETRY_COUNTDOWN,
};
use crate::app_state::TaskContext;
use crate::models::job::TaskName;
use crate::models::result::{StatusCode, TaskResult, VerificationResult, INTERNAL_ERROR_CODE};
use crate::models::sample::{Request, RequestData};
use crate::provider::{ProviderError, ProviderOutput};
use crate::services::telemetry;

/// Scores one request against a read-only snapshot of the learner model.
pub struct VerificationTask {
    attempt: Attempt,
    request_id: i64,
    result_id: i64,
}

impl VerificationTask {
    pub fn new(attempt: Attempt, request_id: i64, result_id: i64) -> Self {
        Self {
            attempt,
            request_id,
            result_id,
        }
    }

    fn trace(&self, ctx: &TaskContext, message: &str) {
        telemetry::trace(ctx.trace, TaskName::Verify, &self.attempt.job_id, message);
    }

    /// Snapshot of the learner model, or a retry while it cannot be analysed.
    async fn model_snapshot(
        &self,
        ctx: &TaskContext,
        learner_id: &str,
    ) -> Result<Option<serde_json::Value>, TaskError> {
        let learner = match ctx.storage.get_model(ctx.provider_id, learner_id).await {
            Ok(learner) => learner,
            Err(e) if e.is_not_found() => {
                return Err(TaskError::Reject("Model not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !learner.can_analyse {
            self.trace(ctx, "Model cannot be analysed yet. Retry later.");
            return Err(TaskError::retry(
                &self.attempt,
                MODEL_RETRY_COUNTDOWN,
                MODEL_MAX_RETRIES,
                format!("Model for learner {learner_id} cannot be analysed yet"),
            ));
        }

        match learner.model.as_deref() {
            Some(url) => Ok(Some(hydrate::download(ctx, &self.attempt, url).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Task for VerificationTask {
    fn name(&self) -> TaskName {
        TaskName::Verify
    }

    fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    async fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        let (provider, descriptor) = load_provider(ctx).await?;
        let pid = ctx.provider_id;

        let record = match ctx.storage.get_request_result(pid, self.result_id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                return Err(TaskError::Reject("Request not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let model = if descriptor.instrument.requires_enrolment {
            self.model_snapshot(ctx, &record.learner_id).await?
        } else {
            None
        };

        let data: RequestData =
            hydrate::download_as(ctx, &self.attempt, &record.request.data).await?;
        let request = Request {
            request_id: self.request_id,
            data,
        };

        let ProviderOutput {
            result,
            notifications,
            delayed_results,
        } = match provider.verify(request, model, self.result_id).await {
            Ok(output) => output,
            Err(ProviderError::Fault(message)) => {
                let message = format!("Exception from provider: {message}");
                let failed = VerificationResult::failed(message.clone(), INTERNAL_ERROR_CODE);
                if let Err(e) = ctx.storage.set_request_result(pid, self.result_id, &failed).await {
                    tracing::warn!(result_id = self.result_id, error = %e, "Failed to store failed result");
                }
                return Err(TaskError::Reject(message));
            }
            Err(e) => return Err(TaskError::from_provider(e)),
        };

        let violation = match result {
            TaskResult::Verification(result) => {
                ctx.storage
                    .set_request_result(pid, self.result_id, &result)
                    .await?;
                None
            }
            TaskResult::VerificationDelayed(_) => {
                ctx.storage
                    .set_request_status(pid, self.result_id, StatusCode::WaitingExternalService)
                    .await?;
                None
            }
            other => {
                ctx.storage
                    .set_request_result(pid, self.result_id, &VerificationResult::internal_error())
                    .await?;
                Some(TaskError::ContractViolation {
                    task: TaskName::Verify,
                    found: other.kind(),
                })
            }
        };

        self.trace(ctx, "Sending delayed results and notifications");
        reconcile(ctx, delayed_results, notifications).await?;

        match violation {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }
}
