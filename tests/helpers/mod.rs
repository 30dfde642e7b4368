//! In-memory storage API and blob store for task flow tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use instrument_provider::{
    app_state::TaskContext,
    models::{
        model::{LearnerModel, ModelUpdate},
        result::{NotificationTask, StatusCode, ValidationResult, VerificationResult},
        sample::{
            NotificationRecord, Page, RequestRecord, RequestResultRecord, SampleRecord,
            SampleValidationRecord, ValidationRecord,
        },
    },
    provider::{ProviderDescriptor, ProviderFactory},
    services::{
        api::{ApiError, StorageApi},
        blobs::{BlobError, BlobStore},
    },
};

pub const PROVIDER_ID: i64 = 7;

/// Every mutation the backend accepted, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Lock { learner_id: String, job_id: String },
    Unlock { learner_id: String, job_id: String },
    SaveModel { learner_id: String, job_id: String, update: ModelUpdate },
    SampleStatus { sample_id: i64, status: StatusCode },
    SampleValidation { sample_id: i64, validation_id: i64, result: ValidationResult },
    SampleValidationStatus { sample_id: i64, validation_id: i64, status: StatusCode },
    RequestResult { result_id: i64, result: VerificationResult },
    RequestStatus { result_id: i64, status: StatusCode },
    UpsertNotification { id: i64, notification: NotificationTask },
    DeleteNotification { id: i64 },
}

impl Write {
    /// Writes other than taking or dropping the lock.
    pub fn is_data_write(&self) -> bool {
        !matches!(self, Write::Lock { .. } | Write::Unlock { .. })
    }
}

#[derive(Default)]
struct State {
    models: HashMap<String, LearnerModel>,
    locks: HashMap<String, String>,
    samples: Vec<SampleRecord>,
    validations: HashMap<i64, Vec<ValidationRecord>>,
    request_results: HashMap<i64, RequestResultRecord>,
    notifications: HashMap<i64, NotificationRecord>,
    blobs: HashMap<String, Value>,
    failing_blobs: HashSet<String>,
    failing_upserts: bool,
    writes: Vec<Write>,
    model_reads: usize,
    next_notification_id: i64,
}

/// Storage API and blob store backed by one in-process state, so blobs
/// written through `save_model` can be downloaded again.
pub struct MemoryBackend {
    descriptor: ProviderDescriptor,
    page_size: usize,
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new(descriptor: ProviderDescriptor) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            page_size: 2,
            state: Mutex::new(State {
                next_notification_id: 100,
                ..Default::default()
            }),
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn context(self: &Arc<Self>, provider: ProviderFactory) -> TaskContext {
        TaskContext::new(PROVIDER_ID, self.clone(), self.clone(), provider)
    }

    pub fn add_learner(&self, learner_id: &str, model: Option<Value>) {
        self.with_state(|s| {
            let url = model.map(|blob| {
                let url = format!("mem://model/{learner_id}");
                s.blobs.insert(url.clone(), blob);
                url
            });
            s.models.insert(
                learner_id.to_string(),
                LearnerModel {
                    learner_id: learner_id.to_string(),
                    model: url,
                    ..Default::default()
                },
            );
        });
    }

    pub fn update_learner(&self, learner_id: &str, f: impl FnOnce(&mut LearnerModel)) {
        self.with_state(|s| {
            if let Some(model) = s.models.get_mut(learner_id) {
                f(model);
            }
        });
    }

    pub fn add_sample(&self, learner_id: &str, sample_id: i64, sensor: Value) {
        self.with_state(|s| {
            let url = format!("mem://sample/{sample_id}");
            s.blobs.insert(url.clone(), sensor);
            s.samples.push(SampleRecord {
                id: sample_id,
                learner_id: learner_id.to_string(),
                data: url,
            });
        });
    }

    pub fn add_validation(&self, sample_id: i64, validation_id: i64, info: Option<Value>) {
        self.with_state(|s| {
            let url = info.map(|info| {
                let url = format!("mem://validation/{validation_id}");
                s.blobs.insert(url.clone(), info);
                url
            });
            s.validations
                .entry(sample_id)
                .or_default()
                .push(ValidationRecord {
                    id: validation_id,
                    info: url,
                });
        });
    }

    pub fn add_request_result(&self, result_id: i64, learner_id: &str, request_id: i64, data: Value) {
        self.with_state(|s| {
            let url = format!("mem://request/{request_id}");
            s.blobs.insert(url.clone(), data);
            s.request_results.insert(
                result_id,
                RequestResultRecord {
                    id: result_id,
                    learner_id: learner_id.to_string(),
                    request: RequestRecord { id: request_id, data: url },
                },
            );
        });
    }

    pub fn add_notification(&self, id: i64, key: &str, info: Option<Value>) {
        self.with_state(|s| {
            s.notifications.insert(
                id,
                NotificationRecord {
                    id,
                    key: key.to_string(),
                    info,
                },
            );
        });
    }

    /// Make downloads of `url` answer 503.
    pub fn fail_blob(&self, url: &str) {
        self.with_state(|s| s.failing_blobs.insert(url.to_string()));
    }

    /// Make every notification upsert answer 500.
    pub fn fail_notification_upserts(&self) {
        self.with_state(|s| s.failing_upserts = true);
    }

    /// Simulate another job holding the model lock.
    pub fn hold_lock(&self, learner_id: &str, job_id: &str) {
        self.with_state(|s| s.locks.insert(learner_id.to_string(), job_id.to_string()));
    }

    pub fn lock_holder(&self, learner_id: &str) -> Option<String> {
        self.with_state(|s| s.locks.get(learner_id).cloned())
    }

    pub fn model(&self, learner_id: &str) -> Option<LearnerModel> {
        self.with_state(|s| s.models.get(learner_id).cloned())
    }

    pub fn model_blob(&self, learner_id: &str) -> Option<Value> {
        self.with_state(|s| {
            let url = s.models.get(learner_id)?.model.clone()?;
            s.blobs.get(&url).cloned()
        })
    }

    pub fn writes(&self) -> Vec<Write> {
        self.with_state(|s| s.writes.clone())
    }

    pub fn data_writes(&self) -> Vec<Write> {
        self.writes().into_iter().filter(Write::is_data_write).collect()
    }

    pub fn model_reads(&self) -> usize {
        self.with_state(|s| s.model_reads)
    }

    pub fn notification_ids(&self) -> Vec<i64> {
        self.with_state(|s| {
            let mut ids: Vec<i64> = s.notifications.keys().copied().collect();
            ids.sort_unstable();
            ids
        })
    }
}

fn not_found(what: impl Into<String>) -> ApiError {
    ApiError::NotFound(what.into())
}

#[async_trait]
impl StorageApi for MemoryBackend {
    async fn get_provider(&self, _provider_id: i64) -> Result<ProviderDescriptor, ApiError> {
        Ok(self.descriptor.clone())
    }

    async fn lock_model(
        &self,
        _provider_id: i64,
        learner_id: &str,
        job_id: &str,
    ) -> Result<LearnerModel, ApiError> {
        self.with_state(|s| {
            match s.locks.get(learner_id) {
                Some(holder) if holder != job_id => return Err(ApiError::Locked),
                _ => {}
            }
            s.locks.insert(learner_id.to_string(), job_id.to_string());
            s.writes.push(Write::Lock {
                learner_id: learner_id.to_string(),
                job_id: job_id.to_string(),
            });
            Ok(s.models
                .entry(learner_id.to_string())
                .or_insert_with(|| LearnerModel {
                    learner_id: learner_id.to_string(),
                    ..Default::default()
                })
                .clone())
        })
    }

    async fn unlock_model(
        &self,
        _provider_id: i64,
        learner_id: &str,
        job_id: &str,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            if s.locks.get(learner_id).map(String::as_str) == Some(job_id) {
                s.locks.remove(learner_id);
            }
            s.writes.push(Write::Unlock {
                learner_id: learner_id.to_string(),
                job_id: job_id.to_string(),
            });
            Ok(())
        })
    }

    async fn save_model(
        &self,
        _provider_id: i64,
        learner_id: &str,
        job_id: &str,
        update: &ModelUpdate,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            if s.locks.get(learner_id).map(String::as_str) != Some(job_id) {
                return Err(ApiError::Status {
                    status: 409,
                    body: format!("model not locked by {job_id}"),
                });
            }
            let url = update.model.as_ref().map(|blob| {
                let url = format!("mem://model/{learner_id}");
                s.blobs.insert(url.clone(), blob.clone());
                url
            });
            let model = s.models.entry(learner_id.to_string()).or_default();
            model.learner_id = learner_id.to_string();
            if url.is_some() {
                model.model = url;
            }
            model.percentage = update.percentage;
            model.can_analyse = update.can_analyse;
            model.used_samples = update.used_samples.clone();

            s.locks.remove(learner_id);
            s.writes.push(Write::SaveModel {
                learner_id: learner_id.to_string(),
                job_id: job_id.to_string(),
                update: update.clone(),
            });
            Ok(())
        })
    }

    async fn get_model(&self, _provider_id: i64, learner_id: &str) -> Result<LearnerModel, ApiError> {
        self.with_state(|s| {
            s.model_reads += 1;
            s.models
                .get(learner_id)
                .cloned()
                .ok_or_else(|| not_found(format!("model {learner_id}")))
        })
    }

    async fn list_unused_samples(
        &self,
        _provider_id: i64,
        learner_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<SampleRecord>, ApiError> {
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let page_size = self.page_size;
        self.with_state(|s| {
            let used = s
                .models
                .get(learner_id)
                .map(|m| m.used_samples.clone())
                .unwrap_or_default();
            let unused: Vec<SampleRecord> = s
                .samples
                .iter()
                .filter(|r| r.learner_id == learner_id && !used.contains(&r.id))
                .cloned()
                .collect();
            let end = (start + page_size).min(unused.len());
            Ok(Page {
                count: unused.len() as u64,
                next: (end < unused.len()).then(|| end.to_string()),
                results: unused.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
            })
        })
    }

    async fn list_sample_validations(
        &self,
        _provider_id: i64,
        _learner_id: &str,
        sample_id: i64,
        _cursor: Option<&str>,
    ) -> Result<Page<ValidationRecord>, ApiError> {
        self.with_state(|s| {
            let results = s.validations.get(&sample_id).cloned().unwrap_or_default();
            Ok(Page {
                count: results.len() as u64,
                next: None,
                results,
            })
        })
    }

    async fn get_sample_validation(
        &self,
        _provider_id: i64,
        _learner_id: &str,
        sample_id: i64,
        validation_id: i64,
    ) -> Result<SampleValidationRecord, ApiError> {
        self.with_state(|s| {
            let known = s
                .validations
                .get(&sample_id)
                .is_some_and(|v| v.iter().any(|r| r.id == validation_id));
            let sample = s.samples.iter().find(|r| r.id == sample_id).cloned();
            match sample {
                Some(sample) if known => Ok(SampleValidationRecord {
                    id: validation_id,
                    sample,
                }),
                _ => Err(not_found(format!("validation {validation_id}"))),
            }
        })
    }

    async fn set_sample_validation(
        &self,
        _provider_id: i64,
        _learner_id: &str,
        sample_id: i64,
        validation_id: i64,
        result: &ValidationResult,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            s.writes.push(Write::SampleValidation {
                sample_id,
                validation_id,
                result: result.clone(),
            });
            Ok(())
        })
    }

    async fn set_sample_validation_status(
        &self,
        _provider_id: i64,
        _learner_id: &str,
        sample_id: i64,
        validation_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            s.writes.push(Write::SampleValidationStatus {
                sample_id,
                validation_id,
                status,
            });
            Ok(())
        })
    }

    async fn set_sample_status(
        &self,
        _provider_id: i64,
        _learner_id: &str,
        sample_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            s.writes.push(Write::SampleStatus { sample_id, status });
            Ok(())
        })
    }

    async fn get_request_result(
        &self,
        _provider_id: i64,
        result_id: i64,
    ) -> Result<RequestResultRecord, ApiError> {
        self.with_state(|s| {
            s.request_results
                .get(&result_id)
                .cloned()
                .ok_or_else(|| not_found(format!("request result {result_id}")))
        })
    }

    async fn set_request_result(
        &self,
        _provider_id: i64,
        result_id: i64,
        result: &VerificationResult,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            s.writes.push(Write::RequestResult {
                result_id,
                result: result.clone(),
            });
            Ok(())
        })
    }

    async fn set_request_status(
        &self,
        _provider_id: i64,
        result_id: i64,
        status: StatusCode,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            s.writes.push(Write::RequestStatus { result_id, status });
            Ok(())
        })
    }

    async fn get_notification(
        &self,
        _provider_id: i64,
        notification_id: i64,
    ) -> Result<NotificationRecord, ApiError> {
        self.with_state(|s| {
            s.notifications
                .get(&notification_id)
                .cloned()
                .ok_or_else(|| not_found(format!("notification {notification_id}")))
        })
    }

    async fn upsert_notification(
        &self,
        _provider_id: i64,
        notification: &NotificationTask,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            if s.failing_upserts {
                return Err(ApiError::Status {
                    status: 500,
                    body: "notification store unavailable".to_string(),
                });
            }
            let existing = s
                .notifications
                .values()
                .find(|n| n.key == notification.key)
                .map(|n| n.id);
            let id = existing.unwrap_or_else(|| {
                s.next_notification_id += 1;
                s.next_notification_id
            });
            s.notifications.insert(
                id,
                NotificationRecord {
                    id,
                    key: notification.key.clone(),
                    info: notification.info.clone(),
                },
            );
            s.writes.push(Write::UpsertNotification {
                id,
                notification: notification.clone(),
            });
            Ok(())
        })
    }

    async fn delete_notification(
        &self,
        _provider_id: i64,
        notification_id: i64,
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            s.notifications.remove(&notification_id);
            s.writes.push(Write::DeleteNotification { id: notification_id });
            Ok(())
        })
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn fetch_json(&self, url: &str) -> Result<Value, BlobError> {
        self.with_state(|s| {
            if s.failing_blobs.contains(url) {
                return Err(BlobError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            s.blobs.get(url).cloned().ok_or_else(|| BlobError::Status {
                url: url.to_string(),
                status: 404,
            })
        })
    }
}
