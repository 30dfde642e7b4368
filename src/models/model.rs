use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::result::EnrolmentResult;

/// Default number of samples a [`SampleModel`] must exceed before analysis.
pub const DEFAULT_MIN_REQUIRED_SAMPLES: usize = 5;

/// Default number of samples at which a [`SampleModel`] is complete.
pub const DEFAULT_REQUIRED_SAMPLES: usize = 15;

/// Per-learner model as stored by the storage API. `model` is a blob URL.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LearnerModel {
    pub learner_id: String,
    pub model: Option<String>,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub can_analyse: bool,
    #[serde(default)]
    pub used_samples: Vec<i64>,
}

/// Fields written back when an enrolment finishes. Saving also releases the
/// model lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUpdate {
    /// New model blob; `None` keeps the stored one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
    pub percentage: f64,
    pub can_analyse: bool,
    pub used_samples: Vec<i64>,
}

impl ModelUpdate {
    /// Write back the record exactly as it was locked.
    pub fn unchanged(current: &LearnerModel) -> Self {
        Self {
            model: None,
            percentage: current.percentage,
            can_analyse: current.can_analyse,
            used_samples: current.used_samples.clone(),
        }
    }
}

impl From<&EnrolmentResult> for ModelUpdate {
    fn from(result: &EnrolmentResult) -> Self {
        Self {
            model: result.model.clone(),
            percentage: result.percentage,
            can_analyse: result.can_analyse,
            used_samples: result.used_samples.clone(),
        }
    }
}

/// Reference sample kept inside a [`SampleModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSample {
    pub id: i64,
    pub features: Option<Value>,
}

/// Model built from a list of reference samples, complete once it holds
/// `required_samples` of them.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleModel {
    percentage: f64,
    samples: Vec<ModelSample>,
    data: Option<Value>,
    min_required_samples: usize,
    required_samples: usize,
}

impl Default for SampleModel {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_REQUIRED_SAMPLES, DEFAULT_REQUIRED_SAMPLES)
    }
}

impl SampleModel {
    pub fn new(min_required_samples: usize, required_samples: usize) -> Self {
        Self {
            percentage: 0.0,
            samples: Vec::new(),
            data: None,
            min_required_samples,
            required_samples: required_samples.max(1),
        }
    }

    /// Load a stored representation. Returns `None` if any key is missing.
    pub fn load(value: &Value) -> Option<Self> {
        let percentage = value.get("percentage")?.as_f64()?;
        let samples = serde_json::from_value(value.get("samples")?.clone()).ok()?;
        let data = value.get("data")?.clone();
        let min_required_samples = value.get("min_required_samples")?.as_u64()? as usize;
        let required_samples = value.get("required_samples")?.as_u64()? as usize;

        Some(Self {
            percentage,
            samples,
            data: (!data.is_null()).then_some(data),
            min_required_samples,
            required_samples: required_samples.max(1),
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "percentage": self.percentage,
            "samples": self.samples,
            "data": self.data,
            "min_required_samples": self.min_required_samples,
            "required_samples": self.required_samples,
        })
    }

    /// Add a sample and refresh the enrolment percentage. A sample already in
    /// the model is ignored, so replaying an enrolment is harmless.
    pub fn add_sample(&mut self, sample_id: i64, features: Option<Value>) -> bool {
        if self.samples.iter().any(|s| s.id == sample_id) {
            return false;
        }
        self.samples.push(ModelSample {
            id: sample_id,
            features,
        });
        self.percentage =
            (self.samples.len() as f64 / self.required_samples as f64).min(1.0);
        true
    }

    pub fn set_min_required_samples(&mut self, num_samples: usize) {
        self.min_required_samples = num_samples;
    }

    pub fn set_required_samples(&mut self, num_samples: usize) {
        self.required_samples = num_samples.max(1);
        if !self.samples.is_empty() {
            self.percentage =
                (self.samples.len() as f64 / self.required_samples as f64).min(1.0);
        }
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = Some(data);
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    pub fn samples(&self) -> &[ModelSample] {
        &self.samples
    }

    /// Analysis starts once the model holds more than the minimum.
    pub fn can_analyse(&self) -> bool {
        self.samples.len() > self.min_required_samples
    }

    pub fn used_samples(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.id).collect()
    }

    pub fn sample_id(&self, idx: usize) -> Option<i64> {
        self.samples.get(idx).map(|s| s.id)
    }

    /// Enrolment result describing the current state of the model.
    pub fn to_result(&self) -> EnrolmentResult {
        EnrolmentResult::new(
            self.to_json(),
            self.percentage,
            self.can_analyse(),
            self.used_samples(),
        )
    }
}
