use async_trait::async_trait;

use super::{
    hydrate, load_provider, reconcile::reconcile, Attempt, EnrolmentState, ModelLock, Task,
    TaskError, LOCK_MAX_RETRIES, LOCK_RETRY_COUNTDOWN,
};
use crate::app_state::TaskContext;
use crate::models::job::TaskName;
use crate::models::model::ModelUpdate;
use crate::models::result::{StatusCode, TaskResult};
use crate::provider::ProviderOutput;
use crate::services::{api::ApiError, telemetry};

/// Builds or refreshes a learner model from its unused samples while
/// holding the model lock.
pub struct EnrolmentTask {
    attempt: Attempt,
    learner_id: String,
    sample_id: Option<i64>,
    lock: ModelLock,
    state: EnrolmentState,
}

impl EnrolmentTask {
    pub fn new(attempt: Attempt, learner_id: String, sample_id: Option<i64>) -> Self {
        let lock = ModelLock::new(learner_id.clone(), attempt.job_id.clone());
        Self {
            attempt,
            learner_id,
            sample_id,
            lock,
            state: EnrolmentState::Start,
        }
    }

    pub fn state(&self) -> EnrolmentState {
        self.state
    }

    fn advance(&mut self, next: EnrolmentState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "Unexpected enrolment transition");
        }
        tracing::debug!(
            job_id = %self.attempt.job_id,
            from = %self.state,
            to = %next,
            "Enrolment state transition"
        );
        self.state = next;
    }

    fn trace(&self, ctx: &TaskContext, message: &str) {
        telemetry::trace(ctx.trace, TaskName::Enrol, &self.attempt.job_id, message);
    }

    async fn mark_samples(
        &self,
        ctx: &TaskContext,
        sample_ids: &[i64],
        status: StatusCode,
    ) -> Result<(), ApiError> {
        for sample_id in sample_ids {
            ctx.storage
                .set_sample_status(ctx.provider_id, &self.learner_id, *sample_id, status)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Task for EnrolmentTask {
    fn name(&self) -> TaskName {
        TaskName::Enrol
    }

    fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    async fn run(&mut self, ctx: &TaskContext) -> Result<(), TaskError> {
        tracing::debug!(
            learner_id = %self.learner_id,
            sample_id = ?self.sample_id,
            retries = self.attempt.retries,
            "Enrolment requested"
        );
        let (provider, _) = load_provider(ctx).await?;

        let record = match self.lock.acquire(ctx).await {
            Ok(record) => record,
            Err(ApiError::Locked) => {
                self.trace(ctx, "Model is locked. Stop execution and retry later.");
                return Err(TaskError::retry(
                    &self.attempt,
                    LOCK_RETRY_COUNTDOWN,
                    LOCK_MAX_RETRIES,
                    format!("Model for learner {} is locked", self.learner_id),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        self.advance(EnrolmentState::LockAcquired);

        let model = match record.model.as_deref() {
            Some(url) => Some(hydrate::download(ctx, &self.attempt, url).await?),
            None => None,
        };
        self.advance(EnrolmentState::ModelHydrated);

        let samples = hydrate::unused_samples(ctx, &self.attempt, &self.learner_id).await?;
        if samples.is_empty() {
            self.trace(ctx, "No available enrolment samples. Reject task.");
            self.lock.release(ctx).await?;
            return Err(TaskError::Reject("No available samples to enrol".to_string()));
        }
        self.advance(EnrolmentState::SamplesFetched);

        let sample_ids: Vec<i64> = samples.iter().map(|s| s.sample_id).collect();
        self.trace(ctx, "Starting enrolment.");
        let ProviderOutput {
            result,
            notifications,
            delayed_results,
        } = provider
            .enrol(samples, model, self.lock.token())
            .await
            .map_err(TaskError::from_provider)?;
        self.advance(EnrolmentState::Delegated);

        self.advance(EnrolmentState::ResultClassified);
        let mut deferred = false;
        match result {
            TaskResult::Enrolment(result) => {
                let update = if result.valid {
                    ModelUpdate::from(&result)
                } else {
                    ModelUpdate::unchanged(&record)
                };
                self.lock.save(ctx, &update).await?;
                self.trace(ctx, "New model saved.");
            }
            TaskResult::EnrolmentDelayed(_) => {
                self.mark_samples(ctx, &sample_ids, StatusCode::WaitingExternalService)
                    .await?;
                deferred = true;
            }
            other => {
                let violation = TaskError::ContractViolation {
                    task: TaskName::Enrol,
                    found: other.kind(),
                };
                telemetry::capture(TaskName::Enrol, &self.attempt.job_id, &violation);
                self.mark_samples(ctx, &sample_ids, StatusCode::Error).await?;
                self.lock.release(ctx).await?;
            }
        }
        self.advance(EnrolmentState::Persisted);

        // The notification that finishes a deferred enrolment is stored here;
        // until then a failure must still release the lock.
        reconcile(ctx, delayed_results, notifications).await?;
        if deferred {
            self.lock.hand_off();
            self.trace(ctx, "Enrolment deferred. Model stays locked.");
        }
        self.advance(EnrolmentState::Reconciled);

        self.advance(EnrolmentState::Done);
        Ok(())
    }

    async fn on_failure(&mut self, ctx: &TaskContext, _error: &TaskError) {
        if let Err(e) = self.lock.release(ctx).await {
            tracing::error!(
                learner_id = %self.learner_id,
                job_id = %self.attempt.job_id,
                error = %e,
                "Failed to release model lock"
            );
        }
        if self.state != EnrolmentState::Start {
            self.advance(EnrolmentState::UnlockedFailed);
        }
    }
}
