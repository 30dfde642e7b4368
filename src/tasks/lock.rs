use crate::app_state::TaskContext;
use crate::models::model::{LearnerModel, ModelUpdate};
use crate::provider::LockToken;
use crate::services::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockState {
    Free,
    Held,
    /// Left with a deferred enrolment, released when it is reconciled.
    HandedOff,
    Released,
}

/// Tracks this job's claim on one learner model so every exit path either
/// saves, releases or deliberately hands the lock off.
#[derive(Debug)]
pub struct ModelLock {
    learner_id: String,
    token: LockToken,
    state: LockState,
}

impl ModelLock {
    pub fn new(learner_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            token: LockToken(job_id.into()),
            state: LockState::Free,
        }
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    pub fn is_held(&self) -> bool {
        self.state == LockState::Held
    }

    pub async fn acquire(&mut self, ctx: &TaskContext) -> Result<LearnerModel, ApiError> {
        let model = ctx
            .storage
            .lock_model(ctx.provider_id, &self.learner_id, self.token.as_str())
            .await?;
        self.state = LockState::Held;
        Ok(model)
    }

    /// Persist the model. The storage API releases the lock on save.
    pub async fn save(&mut self, ctx: &TaskContext, update: &ModelUpdate) -> Result<(), ApiError> {
        ctx.storage
            .save_model(ctx.provider_id, &self.learner_id, self.token.as_str(), update)
            .await?;
        self.state = LockState::Released;
        Ok(())
    }

    /// Release the lock if this job still holds it.
    pub async fn release(&mut self, ctx: &TaskContext) -> Result<(), ApiError> {
        if !self.is_held() {
            return Ok(());
        }
        ctx.storage
            .unlock_model(ctx.provider_id, &self.learner_id, self.token.as_str())
            .await?;
        self.state = LockState::Released;
        Ok(())
    }

    pub fn hand_off(&mut self) {
        if self.is_held() {
            self.state = LockState::HandedOff;
        }
    }
}
