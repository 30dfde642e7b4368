//! Capability contract a pluggable instrument provider implements.
//!
//! Providers are plain values built per job from a [`ProviderRegistry`]
//! entry. Every capability call returns a [`ProviderOutput`]: the primary
//! result plus the notifications and deferred results produced during the
//! call, so nothing accumulates on the provider between calls.

mod reference;
mod registry;

pub use reference::SampleCountProvider;
pub use registry::{ProviderFactory, ProviderRegistry, RegistryError};

use async_trait::async_trait;
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::result::{DelayedResult, NotificationTask, TaskResult};
use crate::models::sample::{Request, Sample};

/// Instrument served by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InstrumentInfo {
    #[garde(skip)]
    pub id: i64,
    #[garde(length(min = 1, max = 32))]
    pub acronym: String,
    /// Whether verification needs an analysable learner model.
    #[serde(default = "default_requires_enrolment")]
    #[garde(skip)]
    pub requires_enrolment: bool,
}

fn default_requires_enrolment() -> bool {
    true
}

/// Static provider description, fetched from the storage API and applied to
/// the provider before each capability call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProviderDescriptor {
    #[garde(dive)]
    pub instrument: InstrumentInfo,
    #[garde(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[garde(skip)]
    pub description: Option<String>,
    #[serde(default)]
    #[garde(skip)]
    pub url: Option<String>,
    #[garde(length(min = 1, max = 32))]
    pub version: String,
    #[garde(length(min = 1, max = 32))]
    pub acronym: String,
    #[serde(default)]
    #[garde(skip)]
    pub options_schema: Option<Value>,
    /// Values for the options described by `options_schema`.
    #[serde(default)]
    #[garde(skip)]
    pub options: Option<Value>,
}

/// Primary result of a capability call plus its side outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput<T = TaskResult> {
    pub result: T,
    pub notifications: Vec<NotificationTask>,
    pub delayed_results: Vec<DelayedResult>,
}

impl<T> ProviderOutput<T> {
    pub fn new(result: T) -> Self {
        Self {
            result,
            notifications: Vec::new(),
            delayed_results: Vec::new(),
        }
    }

    /// Ask for a notification callback.
    pub fn notify(mut self, notification: NotificationTask) -> Self {
        self.notifications.push(notification);
        self
    }

    /// Hand over a deferred result that is now complete.
    pub fn resolve(mut self, delayed: DelayedResult) -> Self {
        self.delayed_results.push(delayed);
        self
    }
}

impl<T> From<T> for ProviderOutput<T> {
    fn from(result: T) -> Self {
        ProviderOutput::new(result)
    }
}

/// Opaque claim on a learner model, handed to `enrol` so a deferred
/// enrolment can later release the lock it was granted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken(pub String);

impl LockToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Apply the provider description and its options. No-op by default.
    fn configure(&mut self, descriptor: &ProviderDescriptor) -> Result<(), ProviderError> {
        let _ = descriptor;
        Ok(())
    }

    /// Create or update a model from unconsumed samples. Must give the same
    /// answer for the same samples and model.
    async fn enrol(
        &self,
        samples: Vec<Sample>,
        model: Option<Value>,
        lock: &LockToken,
    ) -> Result<ProviderOutput, ProviderError> {
        let _ = (samples, model, lock);
        Err(ProviderError::NotImplemented("enrol"))
    }

    /// Judge the quality of a single enrolment sample.
    async fn validate_sample(
        &self,
        sample: Sample,
        validation_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        let _ = (sample, validation_id);
        Err(ProviderError::NotImplemented("validate_sample"))
    }

    /// Score a verification request against the learner model.
    async fn verify(
        &self,
        request: Request,
        model: Option<Value>,
        result_id: i64,
    ) -> Result<ProviderOutput, ProviderError> {
        let _ = (request, model, result_id);
        Err(ProviderError::NotImplemented("verify"))
    }

    /// Resume work after a scheduled notification fires.
    async fn on_notification(
        &self,
        key: &str,
        info: Option<Value>,
    ) -> Result<ProviderOutput<()>, ProviderError> {
        let _ = (key, info);
        Err(ProviderError::NotImplemented("on_notification"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Method not implemented on provider: {0}")]
    NotImplemented(&'static str),

    #[error("{0}")]
    Fault(String),

    #[error("Invalid provider configuration: {0}")]
    Config(String),
}
