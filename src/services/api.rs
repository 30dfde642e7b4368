//! Contract of the storage/API service that persists models, samples,
//! requests and notifications, and owns the per-learner model lock.

use async_trait::async_trait;

use crate::models::model::{LearnerModel, ModelUpdate};
use crate::models::result::{NotificationTask, StatusCode, ValidationResult, VerificationResult};
use crate::models::sample::{
    NotificationRecord, Page, RequestResultRecord, SampleRecord, SampleValidationRecord,
    ValidationRecord,
};
use crate::provider::ProviderDescriptor;

#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn get_provider(&self, provider_id: i64) -> Result<ProviderDescriptor, ApiError>;

    /// Take the exclusive model lock for `job_id`. Fails with
    /// [`ApiError::Locked`] while another job holds it.
    async fn lock_model(
        &self,
        provider_id: i64,
        learner_id: &str,
        job_id: &str,
    ) -> Result<LearnerModel, ApiError>;

    async fn unlock_model(
        &self,
        provider_id: i64,
        learner_id: &str,
        job_id: &str,
    ) -> Result<(), ApiError>;

    /// Persist model fields and release the lock held by `job_id`.
    async fn save_model(
        &self,
        provider_id: i64,
        learner_id: &str,
        job_id: &str,
        update: &ModelUpdate,
    ) -> Result<(), ApiError>;

    async fn get_model(&self, provider_id: i64, learner_id: &str)
        -> Result<LearnerModel, ApiError>;

    /// Samples not yet used by the learner's model. `cursor` is the `next`
    /// value of the previous page.
    async fn list_unused_samples(
        &self,
        provider_id: i64,
        learner_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<SampleRecord>, ApiError>;

    async fn list_sample_validations(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        cursor: Option<&str>,
    ) -> Result<Page<ValidationRecord>, ApiError>;

    async fn get_sample_validation(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        validation_id: i64,
    ) -> Result<SampleValidationRecord, ApiError>;

    async fn set_sample_validation(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        validation_id: i64,
        result: &ValidationResult,
    ) -> Result<(), ApiError>;

    async fn set_sample_validation_status(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        validation_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError>;

    async fn set_sample_status(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError>;

    async fn get_request_result(
        &self,
        provider_id: i64,
        result_id: i64,
    ) -> Result<RequestResultRecord, ApiError>;

    async fn set_request_result(
        &self,
        provider_id: i64,
        result_id: i64,
        result: &VerificationResult,
    ) -> Result<(), ApiError>;

    async fn set_request_status(
        &self,
        provider_id: i64,
        result_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError>;

    async fn get_notification(
        &self,
        provider_id: i64,
        notification_id: i64,
    ) -> Result<NotificationRecord, ApiError>;

    /// Create the notification, or move an existing one with the same key.
    async fn upsert_notification(
        &self,
        provider_id: i64,
        notification: &NotificationTask,
    ) -> Result<(), ApiError>;

    async fn delete_notification(
        &self,
        provider_id: i64,
        notification_id: i64,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource is locked by another task")]
    Locked,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Storage API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode storage API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
