//! Provider that enrols by collecting reference samples and accepts any
//! request once the model holds enough of them. It performs no scoring and
//! exists to exercise the task flow end to end.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{LockToken, Provider, ProviderDescriptor, ProviderError, ProviderOutput};
use crate::models::message::ProviderMessage;
use crate::models::model::{SampleModel, DEFAULT_MIN_REQUIRED_SAMPLES, DEFAULT_REQUIRED_SAMPLES};
use crate::models::result::{AlertCode, TaskResult, ValidationResult, VerificationResult};
use crate::models::sample::{Request, Sample};

/// Model data key listing samples rejected during enrolment.
const DISCARDED_KEY: &str = "discarded_samples";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct SampleCountOptions {
    #[serde(default = "default_min_required")]
    min_required_samples: usize,
    #[serde(default = "default_required")]
    required_samples: usize,
}

fn default_min_required() -> usize {
    DEFAULT_MIN_REQUIRED_SAMPLES
}

fn default_required() -> usize {
    DEFAULT_REQUIRED_SAMPLES
}

impl Default for SampleCountOptions {
    fn default() -> Self {
        Self {
            min_required_samples: DEFAULT_MIN_REQUIRED_SAMPLES,
            required_samples: DEFAULT_REQUIRED_SAMPLES,
        }
    }
}

#[derive(Debug, Default)]
pub struct SampleCountProvider {
    options: SampleCountOptions,
}

impl SampleCountProvider {
    pub const NAME: &'static str = "sample-count";

    fn load_model(&self, model: Option<&Value>) -> SampleModel {
        let mut loaded = model
            .and_then(SampleModel::load)
            .unwrap_or_else(|| {
                SampleModel::new(self.options.min_required_samples, self.options.required_samples)
            });
        loaded.set_min_required_samples(self.options.min_required_samples);
        loaded.set_required_samples(self.options.required_samples);
        loaded
    }

    fn discarded_samples(model: &SampleModel) -> Vec<i64> {
        model
            .data()
            .and_then(|data| data.get(DISCARDED_KEY))
            .and_then(|ids| serde_json::from_value(ids.clone()).ok())
            .unwrap_or_default()
    }

    fn check_sample(sample: &Sample) -> Result<Vec<u8>, ValidationResult> {
        if sample.mime_type().is_none() {
            return Err(ValidationResult::rejected(
                "Sample has no mimetype",
                ProviderMessage::ProviderMissingMimetype.to_string(),
            ));
        }
        sample.data.decode().ok_or_else(|| {
            ValidationResult::rejected(
                "Sample data is not valid base64",
                ProviderMessage::ProviderInvalidSampleData.to_string(),
            )
        })
    }
}

#[async_trait]
impl Provider for SampleCountProvider {
    fn configure(&mut self, descriptor: &ProviderDescriptor) -> Result<(), ProviderError> {
        self.options = match &descriptor.options {
            Some(options) => serde_json::from_value(options.clone())
                .map_err(|e| ProviderError::Config(e.to_string()))?,
            None => SampleCountOptions::default(),
        };
        if self.options.required_samples < self.options.min_required_samples {
            return Err(ProviderError::Config(format!(
                "required_samples ({}) is below min_required_samples ({})",
                self.options.required_samples, self.options.min_required_samples
            )));
        }
        Ok(())
    }

    async fn enrol(
        &self,
        samples: Vec<Sample>,
        model: Option<Value>,
        _lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        let mut sample_model = self.load_model(model.as_ref());
        let mut discarded = Self::discarded_samples(&sample_model);

        for sample in &samples {
            // Samples that would fail validation never count towards the model.
            let Ok(bytes) = Self::check_sample(sample) else {
                tracing::debug!(sample_id = sample.sample_id, "Discarding invalid sample");
                discarded.push(sample.sample_id);
                continue;
            };
            let features = json!({
                "mimetype": sample.mime_type(),
                "size": bytes.len(),
            });
            sample_model.add_sample(sample.sample_id, Some(features));
        }

        discarded.sort_unstable();
        discarded.dedup();
        if !discarded.is_empty() {
            sample_model.set_data(json!({ DISCARDED_KEY: discarded }));
        }

        // Discarded samples are reported as used so they are not offered again.
        let mut result = sample_model.to_result();
        result.used_samples.extend(&discarded);
        Ok(TaskResult::Enrolment(result).into())
    }

    async fn validate_sample(
        &self,
        sample: Sample,
        _validation_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        let result = match Self::check_sample(&sample) {
            Ok(bytes) => ValidationResult {
                contribution: Some(1.0 / self.options.required_samples.max(1) as f64),
                info: Some(json!({"size": bytes.len()})),
                ..ValidationResult::accepted()
            },
            Err(rejected) => rejected,
        };
        Ok(TaskResult::Validation(result).into())
    }

    async fn verify(
        &self,
        request: Request,
        model: Option<Value>,
        _result_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        let ready = model
            .as_ref()
            .and_then(SampleModel::load)
            .is_some_and(|m| m.can_analyse());

        let result = if !ready {
            VerificationResult::failed(
                "Learner enrolment is not complete",
                ProviderMessage::ProviderIncompleteEnrolment.to_string(),
            )
        } else if request.mime_type().is_none() {
            VerificationResult::failed(
                "Request has no mimetype",
                ProviderMessage::ProviderMissingMimetype.to_string(),
            )
        } else {
            VerificationResult::new(true, AlertCode::Ok)
        };
        Ok(TaskResult::Verification(result).into())
    }
}
