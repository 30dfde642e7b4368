use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode as HttpStatus};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::models::model::{LearnerModel, ModelUpdate};
use crate::models::result::{NotificationTask, StatusCode, ValidationResult, VerificationResult};
use crate::models::sample::{
    NotificationRecord, Page, RequestResultRecord, SampleRecord, SampleValidationRecord,
    ValidationRecord,
};
use crate::provider::ProviderDescriptor;
use crate::services::api::{ApiError, StorageApi};

/// HTTP client for the storage/API service.
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client. `ssl_verify = false` accepts invalid certificates,
    /// for deployments behind self-signed TLS.
    pub fn new(base_url: &str, token: Option<String>, ssl_verify: bool) -> Result<Self, ApiError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(!ssl_verify)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn provider_url(&self, provider_id: i64) -> String {
        format!("{}/api/v2/provider/{}", self.base_url, provider_id)
    }

    fn enrolment_url(&self, provider_id: i64, learner_id: &str) -> String {
        format!("{}/enrolment/{}", self.provider_url(provider_id), learner_id)
    }

    fn validation_url(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        validation_id: i64,
    ) -> String {
        format!(
            "{}/sample/{}/validation/{}",
            self.enrolment_url(provider_id, learner_id),
            sample_id,
            validation_id
        )
    }

    fn request_url(&self, provider_id: i64, result_id: i64) -> String {
        format!("{}/request/{}", self.provider_url(provider_id), result_id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        match status {
            HttpStatus::NOT_FOUND => Err(ApiError::NotFound(url)),
            HttpStatus::LOCKED => Err(ApiError::Locked),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let bytes = self.execute(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn submit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.execute(request).await?;
        Ok(())
    }

    /// First page from `url`, or the page the cursor points at.
    fn page_request(&self, url: String, cursor: Option<&str>) -> RequestBuilder {
        match cursor {
            Some(next) => self.http.get(next),
            None => self.http.get(format!("{url}/")),
        }
    }
}

/// A lock request may also be refused with 409 while another job holds the
/// model. Other endpoints keep 409 as a plain status error.
fn lock_conflict(error: ApiError) -> ApiError {
    match error {
        ApiError::Status { status: 409, .. } => ApiError::Locked,
        other => other,
    }
}

#[async_trait]
impl StorageApi for ApiClient {
    async fn get_provider(&self, provider_id: i64) -> Result<ProviderDescriptor, ApiError> {
        let url = format!("{}/", self.provider_url(provider_id));
        self.fetch(self.http.get(url)).await
    }

    async fn lock_model(
        &self,
        provider_id: i64,
        learner_id: &str,
        job_id: &str,
    ) -> Result<LearnerModel, ApiError> {
        let url = format!("{}/lock/", self.enrolment_url(provider_id, learner_id));
        self.fetch(self.http.post(url).json(&json!({ "task_id": job_id })))
            .await
            .map_err(lock_conflict)
    }

    async fn unlock_model(
        &self,
        provider_id: i64,
        learner_id: &str,
        job_id: &str,
    ) -> Result<(), ApiError> {
        let url = format!("{}/unlock/", self.enrolment_url(provider_id, learner_id));
        self.submit(self.http.post(url).json(&json!({ "task_id": job_id })))
            .await
    }

    async fn save_model(
        &self,
        provider_id: i64,
        learner_id: &str,
        job_id: &str,
        update: &ModelUpdate,
    ) -> Result<(), ApiError> {
        let url = format!("{}/save/", self.enrolment_url(provider_id, learner_id));
        let mut body = serde_json::to_value(update)?;
        body["task_id"] = json!(job_id);
        self.submit(self.http.post(url).json(&body)).await
    }

    async fn get_model(
        &self,
        provider_id: i64,
        learner_id: &str,
    ) -> Result<LearnerModel, ApiError> {
        let url = format!("{}/", self.enrolment_url(provider_id, learner_id));
        self.fetch(self.http.get(url)).await
    }

    async fn list_unused_samples(
        &self,
        provider_id: i64,
        learner_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<SampleRecord>, ApiError> {
        let url = format!(
            "{}/available_samples",
            self.enrolment_url(provider_id, learner_id)
        );
        self.fetch(self.page_request(url, cursor)).await
    }

    async fn list_sample_validations(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        cursor: Option<&str>,
    ) -> Result<Page<ValidationRecord>, ApiError> {
        let url = format!(
            "{}/sample/{}/validation",
            self.enrolment_url(provider_id, learner_id),
            sample_id
        );
        self.fetch(self.page_request(url, cursor)).await
    }

    async fn get_sample_validation(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        validation_id: i64,
    ) -> Result<SampleValidationRecord, ApiError> {
        let url = format!(
            "{}/",
            self.validation_url(provider_id, learner_id, sample_id, validation_id)
        );
        self.fetch(self.http.get(url)).await
    }

    async fn set_sample_validation(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        validation_id: i64,
        result: &ValidationResult,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/",
            self.validation_url(provider_id, learner_id, sample_id, validation_id)
        );
        self.submit(self.http.put(url).json(&result.to_payload()))
            .await
    }

    async fn set_sample_validation_status(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        validation_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/status/",
            self.validation_url(provider_id, learner_id, sample_id, validation_id)
        );
        self.submit(self.http.put(url).json(&json!({ "status": status })))
            .await
    }

    async fn set_sample_status(
        &self,
        provider_id: i64,
        learner_id: &str,
        sample_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/sample/{}/status/",
            self.enrolment_url(provider_id, learner_id),
            sample_id
        );
        self.submit(self.http.put(url).json(&json!({ "status": status })))
            .await
    }

    async fn get_request_result(
        &self,
        provider_id: i64,
        result_id: i64,
    ) -> Result<RequestResultRecord, ApiError> {
        let url = format!("{}/", self.request_url(provider_id, result_id));
        self.fetch(self.http.get(url)).await
    }

    async fn set_request_result(
        &self,
        provider_id: i64,
        result_id: i64,
        result: &VerificationResult,
    ) -> Result<(), ApiError> {
        let url = format!("{}/", self.request_url(provider_id, result_id));
        self.submit(self.http.put(url).json(&result.to_payload()))
            .await
    }

    async fn set_request_status(
        &self,
        provider_id: i64,
        result_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError> {
        let url = format!("{}/status/", self.request_url(provider_id, result_id));
        self.submit(self.http.put(url).json(&json!({ "status": status })))
            .await
    }

    async fn get_notification(
        &self,
        provider_id: i64,
        notification_id: i64,
    ) -> Result<NotificationRecord, ApiError> {
        let url = format!(
            "{}/notification/{}/",
            self.provider_url(provider_id),
            notification_id
        );
        self.fetch(self.http.get(url)).await
    }

    async fn upsert_notification(
        &self,
        provider_id: i64,
        notification: &NotificationTask,
    ) -> Result<(), ApiError> {
        let url = format!("{}/notification/", self.provider_url(provider_id));
        self.submit(self.http.post(url).json(&notification.to_payload()))
            .await
    }

    async fn delete_notification(
        &self,
        provider_id: i64,
        notification_id: i64,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/notification/{}/",
            self.provider_url(provider_id),
            notification_id
        );
        self.submit(self.http.delete(url)).await
    }
}
