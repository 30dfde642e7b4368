//! Provider descriptors, sample payloads and scripted providers.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use instrument_provider::{
    models::{
        audit::Audit,
        model::SampleModel,
        result::{
            AlertCode, DelayedResult, EnrolmentDelayedResult, EnrolmentResult, NotificationTask,
            TaskResult, ValidationDelayedResult, ValidationResult, VerificationDelayedResult,
            VerificationResult,
        },
        sample::{Request, Sample},
    },
    provider::{
        InstrumentInfo, LockToken, Provider, ProviderDescriptor, ProviderError, ProviderOutput,
        SampleCountProvider,
    },
};

pub const LEARNER: &str = "5d3c3f4e-9a1b-4c8e-8d2f-0b6a7c1e2f30";

/// Base64 of "hello".
pub const HELLO_B64: &str = "aGVsbG8=";

pub fn descriptor(requires_enrolment: bool, options: Option<Value>) -> ProviderDescriptor {
    ProviderDescriptor {
        instrument: InstrumentInfo {
            id: 1,
            acronym: "fr".to_string(),
            requires_enrolment,
        },
        name: "Face Recognition".to_string(),
        description: Some("Scripted provider for task flow tests".to_string()),
        url: None,
        version: "1.0.0".to_string(),
        acronym: "tfr".to_string(),
        options_schema: None,
        options,
    }
}

/// Options making the sample-count provider analyse after two samples.
pub fn small_model_options() -> Value {
    json!({"min_required_samples": 1, "required_samples": 4})
}

pub fn sensor(mimetype: &str) -> Value {
    json!({
        "data": HELLO_B64,
        "metadata": {"mimetype": mimetype, "context": {}},
        "instruments": [1]
    })
}

pub fn request_data(learner_id: &str) -> Value {
    json!({
        "learner_id": learner_id,
        "course_id": 3,
        "activity_id": 8,
        "session_id": 21,
        "data": HELLO_B64,
        "metadata": {"mimetype": "image/jpeg"},
        "instruments": [1]
    })
}

/// Face recognition validation info as stored by another provider.
pub fn fr_validation_info() -> Value {
    json!({
        "instrument": {"id": 1, "acronym": "fr"},
        "provider": {"id": 2, "acronym": "tfr", "version": "1.0.0"},
        "info": {"faces": 1},
        "face_location": null,
        "pose": null
    })
}

/// Analysable model blob for `sample_ids`.
pub fn ready_model(sample_ids: &[i64]) -> Value {
    let mut model = SampleModel::new(1, 4);
    for id in sample_ids {
        model.add_sample(*id, None);
    }
    model.to_json()
}

pub fn sample_count() -> Box<dyn Provider> {
    Box::new(SampleCountProvider::default())
}

/// Sample-count provider that takes its time enrolling.
pub struct SlowProvider(SampleCountProvider);

pub fn slow() -> Box<dyn Provider> {
    Box::new(SlowProvider(SampleCountProvider::default()))
}

#[async_trait]
impl Provider for SlowProvider {
    fn configure(&mut self, descriptor: &ProviderDescriptor) -> Result<(), ProviderError> {
        self.0.configure(descriptor)
    }

    async fn enrol(
        &self,
        samples: Vec<Sample>,
        model: Option<Value>,
        lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.0.enrol(samples, model, lock).await
    }
}

/// Every capability raises.
pub struct FaultyProvider;

pub fn faulty() -> Box<dyn Provider> {
    Box::new(FaultyProvider)
}

fn fault() -> ProviderError {
    ProviderError::Fault("scoring service unreachable".to_string())
}

#[async_trait]
impl Provider for FaultyProvider {
    async fn enrol(
        &self,
        _samples: Vec<Sample>,
        _model: Option<Value>,
        _lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        Err(fault())
    }

    async fn validate_sample(
        &self,
        _sample: Sample,
        _validation_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        Err(fault())
    }

    async fn verify(
        &self,
        _request: Request,
        _model: Option<Value>,
        _result_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        Err(fault())
    }

    async fn on_notification(
        &self,
        _key: &str,
        _info: Option<Value>,
    ) -> Result<ProviderOutput<()>, ProviderError> {
        Err(fault())
    }
}

/// Answers every capability with a result of the wrong kind, plus a
/// notification so reconciliation can be observed.
pub struct MisbehavingProvider;

pub fn misbehaving() -> Box<dyn Provider> {
    Box::new(MisbehavingProvider)
}

#[async_trait]
impl Provider for MisbehavingProvider {
    async fn enrol(
        &self,
        _samples: Vec<Sample>,
        _model: Option<Value>,
        _lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::new(TaskResult::Verification(VerificationResult::new(
            true,
            AlertCode::Ok,
        )))
        .notify(NotificationTask::new("after-enrol", None)))
    }

    async fn validate_sample(
        &self,
        _sample: Sample,
        _validation_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        Ok(TaskResult::Enrolment(EnrolmentResult::invalid("wrong kind")).into())
    }

    async fn verify(
        &self,
        _request: Request,
        _model: Option<Value>,
        _result_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::new(TaskResult::Validation(ValidationResult::accepted()))
            .notify(NotificationTask::new("after-verify", None)))
    }
}

/// Enrolment that reports failure.
pub struct RefusingProvider;

pub fn refusing() -> Box<dyn Provider> {
    Box::new(RefusingProvider)
}

#[async_trait]
impl Provider for RefusingProvider {
    async fn enrol(
        &self,
        _samples: Vec<Sample>,
        _model: Option<Value>,
        _lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        Ok(TaskResult::Enrolment(EnrolmentResult::invalid("Samples are unusable")).into())
    }
}

/// Overrides nothing.
pub struct UnimplementedProvider;

pub fn unimplemented_provider() -> Box<dyn Provider> {
    Box::new(UnimplementedProvider)
}

#[async_trait]
impl Provider for UnimplementedProvider {}

/// Waits on an external service for everything, then finishes the work when
/// the notification fires. The notification info carries what it needs.
pub struct DeferringProvider;

pub fn deferring() -> Box<dyn Provider> {
    Box::new(DeferringProvider)
}

pub const RESUME_KEY: &str = "resume";

#[async_trait]
impl Provider for DeferringProvider {
    async fn enrol(
        &self,
        samples: Vec<Sample>,
        _model: Option<Value>,
        lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        let learner_id = samples
            .first()
            .map(|s| s.learner_id.clone())
            .unwrap_or_default();
        let sample_ids: Vec<i64> = samples.iter().map(|s| s.sample_id).collect();
        let info = json!({
            "kind": "enrolment",
            "learner_id": learner_id,
            "sample_ids": sample_ids,
            "task_id": lock.as_str(),
        });

        Ok(ProviderOutput::new(TaskResult::EnrolmentDelayed(EnrolmentDelayedResult {
            learner_id,
            sample_ids,
            task_id: lock.as_str().to_string(),
            result: None,
            info: None,
        }))
        .notify(NotificationTask::after(RESUME_KEY, 5, Some(info))))
    }

    async fn validate_sample(
        &self,
        sample: Sample,
        validation_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        // An earlier validation of another sample completes meanwhile.
        Ok(ProviderOutput::new(TaskResult::ValidationDelayed(ValidationDelayedResult {
            learner_id: sample.learner_id.clone(),
            sample_id: sample.sample_id,
            validation_id,
            result: None,
            info: None,
        }))
        .resolve(DelayedResult::Validation(ValidationDelayedResult {
            learner_id: sample.learner_id,
            sample_id: 90,
            validation_id: 91,
            result: Some(ValidationResult::accepted()),
            info: None,
        })))
    }

    async fn verify(
        &self,
        request: Request,
        _model: Option<Value>,
        result_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        Ok(ProviderOutput::new(TaskResult::VerificationDelayed(VerificationDelayedResult {
            learner_id: request.learner_id().map(str::to_string),
            result_id,
            result: None,
            info: None,
        }))
        .notify(NotificationTask::new(
            RESUME_KEY,
            Some(json!({"kind": "verification", "result_id": result_id})),
        )))
    }

    async fn on_notification(
        &self,
        _key: &str,
        info: Option<Value>,
    ) -> Result<ProviderOutput<()>, ProviderError> {
        let info = info.ok_or_else(|| ProviderError::Fault("missing notification info".into()))?;
        let delayed = match info["kind"].as_str() {
            Some("enrolment") => {
                let sample_ids: Vec<i64> = serde_json::from_value(info["sample_ids"].clone())
                    .map_err(|e| ProviderError::Fault(e.to_string()))?;
                let mut model = SampleModel::new(1, 4);
                for id in &sample_ids {
                    model.add_sample(*id, None);
                }
                DelayedResult::Enrolment(EnrolmentDelayedResult {
                    learner_id: info["learner_id"].as_str().unwrap_or_default().to_string(),
                    sample_ids,
                    task_id: info["task_id"].as_str().unwrap_or_default().to_string(),
                    result: Some(model.to_result()),
                    info: None,
                })
            }
            Some("verification") => DelayedResult::Verification(VerificationDelayedResult {
                learner_id: None,
                result_id: info["result_id"].as_i64().unwrap_or_default(),
                result: Some(
                    VerificationResult::new(true, AlertCode::Warning)
                        .with_score(0.8)
                        .with_audit(Audit::face_recognition(vec![], vec!["low light".into()])),
                ),
                info: None,
            }),
            other => {
                return Err(ProviderError::Fault(format!("unknown resume kind {other:?}")));
            }
        };
        Ok(ProviderOutput::new(()).resolve(delayed))
    }
}

/// Reports whether it was given a model, without scoring anything.
pub struct ModelProbeProvider;

pub fn model_probe() -> Box<dyn Provider> {
    Box::new(ModelProbeProvider)
}

pub const MODEL_PRESENT: &str = "MODEL_PRESENT";
pub const MODEL_ABSENT: &str = "MODEL_ABSENT";

#[async_trait]
impl Provider for ModelProbeProvider {
    async fn verify(
        &self,
        _request: Request,
        model: Option<Value>,
        _result_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        let code = if model.is_some() { MODEL_PRESENT } else { MODEL_ABSENT };
        Ok(TaskResult::Verification(
            VerificationResult::new(true, AlertCode::Ok).with_message_code(code),
        )
        .into())
    }
}

/// Enrols a model listing how many parsed validations each sample carried.
pub struct ValidationCountingProvider;

pub fn validation_counting() -> Box<dyn Provider> {
    Box::new(ValidationCountingProvider)
}

#[async_trait]
impl Provider for ValidationCountingProvider {
    async fn enrol(
        &self,
        samples: Vec<Sample>,
        _model: Option<Value>,
        _lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        let counts: Vec<Value> = samples
            .iter()
            .map(|s| json!([s.sample_id, s.validations.len()]))
            .collect();
        let ids = samples.iter().map(|s| s.sample_id).collect();
        Ok(TaskResult::Enrolment(EnrolmentResult::new(
            json!({"validations": counts}),
            0.5,
            false,
            ids,
        ))
        .into())
    }
}
