use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{Display, EnumString};

use crate::models::audit::Audit;

/// Delay applied to a notification scheduled without an explicit time.
pub const DEFAULT_NOTIFICATION_DELAY_SECS: i64 = 60;

/// Message code attached to results synthesized after a provider failure.
pub const INTERNAL_ERROR_CODE: &str = "INTERNAL_ERROR";

/// Processing status persisted for samples, validations and request results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Pending,
    Processed,
    Error,
    Timeout,
    MissingProvider,
    MissingEnrolment,
    WaitingExternalService,
}

impl StatusCode {
    /// Integer code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            StatusCode::Pending => 0,
            StatusCode::Processed => 1,
            StatusCode::Error => 2,
            StatusCode::Timeout => 3,
            StatusCode::MissingProvider => 4,
            StatusCode::MissingEnrolment => 5,
            StatusCode::WaitingExternalService => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(StatusCode::Pending),
            1 => Some(StatusCode::Processed),
            2 => Some(StatusCode::Error),
            3 => Some(StatusCode::Timeout),
            4 => Some(StatusCode::MissingProvider),
            5 => Some(StatusCode::MissingEnrolment),
            6 => Some(StatusCode::WaitingExternalService),
            _ => None,
        }
    }

    fn from_valid(valid: bool) -> Self {
        if valid {
            StatusCode::Processed
        } else {
            StatusCode::Error
        }
    }
}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, String> {
        StatusCode::from_code(code).ok_or_else(|| format!("Invalid status code: {code}"))
    }
}

/// Alert level of a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertCode {
    Pending,
    #[default]
    Ok,
    Warning,
    Alert,
}

impl From<AlertCode> for u8 {
    fn from(code: AlertCode) -> Self {
        match code {
            AlertCode::Pending => 0,
            AlertCode::Ok => 1,
            AlertCode::Warning => 2,
            AlertCode::Alert => 3,
        }
    }
}

impl TryFrom<u8> for AlertCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, String> {
        match code {
            0 => Ok(AlertCode::Pending),
            1 => Ok(AlertCode::Ok),
            2 => Ok(AlertCode::Warning),
            3 => Ok(AlertCode::Alert),
            other => Err(format!("Invalid alert code: {other}")),
        }
    }
}

/// Outcome of validating a single enrolment sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error_message: Option<String>,
    pub info: Option<Value>,
    pub contribution: Option<f64>,
    pub message_code: Option<String>,
}

impl ValidationResult {
    pub fn accepted() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    pub fn rejected(error_message: impl Into<String>, message_code: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_message: Some(error_message.into()),
            message_code: Some(message_code.into()),
            ..Default::default()
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_valid(self.valid)
    }

    /// Body sent to the storage API.
    pub fn to_payload(&self) -> Value {
        json!({
            "status": self.status(),
            "error_message": self.error_message,
            "validation_info": self.info,
            "message_code_id": self.message_code,
            "contribution": self.contribution,
        })
    }
}

/// Outcome of an enrolment: the refreshed model and its readiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolmentResult {
    pub valid: bool,
    pub model: Option<Value>,
    pub percentage: f64,
    pub can_analyse: bool,
    #[serde(default)]
    pub used_samples: Vec<i64>,
    pub error_message: Option<String>,
}

impl EnrolmentResult {
    pub fn new(model: Value, percentage: f64, can_analyse: bool, used_samples: Vec<i64>) -> Self {
        Self {
            valid: true,
            model: Some(model),
            percentage,
            can_analyse,
            used_samples,
            error_message: None,
        }
    }

    pub fn invalid(error_message: impl Into<String>) -> Self {
        Self {
            valid: false,
            model: None,
            percentage: 0.0,
            can_analyse: false,
            used_samples: Vec::new(),
            error_message: Some(error_message.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_valid(self.valid)
    }
}

/// Outcome of scoring a verification request against a learner model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub code: AlertCode,
    pub result: Option<f64>,
    pub audit: Option<Audit>,
    pub message_code: Option<String>,
    pub error_message: Option<String>,
}

impl VerificationResult {
    pub fn new(valid: bool, code: AlertCode) -> Self {
        Self {
            valid,
            code,
            ..Default::default()
        }
    }

    /// A failed result carrying an error message and message code.
    pub fn failed(error_message: impl Into<String>, message_code: impl Into<String>) -> Self {
        Self {
            valid: false,
            code: AlertCode::Ok,
            error_message: Some(error_message.into()),
            message_code: Some(message_code.into()),
            ..Default::default()
        }
    }

    /// Result synthesized when the provider misbehaves.
    pub fn internal_error() -> Self {
        Self::failed("Internal provider error", INTERNAL_ERROR_CODE)
    }

    /// Attach a score, clamped to `[0, 1]`.
    pub fn with_score(mut self, score: f64) -> Self {
        self.result = Some(score.clamp(0.0, 1.0));
        self
    }

    pub fn with_audit(mut self, audit: Audit) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_message_code(mut self, code: impl Into<String>) -> Self {
        self.message_code = Some(code.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_valid(self.valid)
    }

    /// Body sent to the storage API.
    pub fn to_payload(&self) -> Value {
        json!({
            "status": self.status(),
            "error_message": self.error_message,
            "audit": self.audit,
            "result": self.result,
            "code": self.code,
            "message_code": self.message_code,
        })
    }
}

/// Validation that will complete later, once an external service answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDelayedResult {
    pub learner_id: String,
    pub sample_id: i64,
    pub validation_id: i64,
    pub result: Option<ValidationResult>,
    pub info: Option<Value>,
}

/// Enrolment that will complete later. The model lock stays with `task_id`
/// until the final result is reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolmentDelayedResult {
    pub learner_id: String,
    pub sample_ids: Vec<i64>,
    pub task_id: String,
    pub result: Option<EnrolmentResult>,
    pub info: Option<Value>,
}

/// Verification that will complete later. `result_id` is the request result
/// record the final result is written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationDelayedResult {
    pub learner_id: Option<String>,
    pub result_id: i64,
    pub result: Option<VerificationResult>,
    pub info: Option<Value>,
}

/// Deferred result accumulated by a provider call, dispatched by kind
/// during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayedResult {
    Validation(ValidationDelayedResult),
    Enrolment(EnrolmentDelayedResult),
    Verification(VerificationDelayedResult),
}

impl DelayedResult {
    /// Deferred results are pending by definition.
    pub fn status(&self) -> StatusCode {
        StatusCode::WaitingExternalService
    }
}

/// Primary result of a capability call, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    Validation(ValidationResult),
    ValidationDelayed(ValidationDelayedResult),
    Enrolment(EnrolmentResult),
    EnrolmentDelayed(EnrolmentDelayedResult),
    Verification(VerificationResult),
    VerificationDelayed(VerificationDelayedResult),
}

impl TaskResult {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskResult::Validation(_) => "validation",
            TaskResult::ValidationDelayed(_) => "validation_delayed",
            TaskResult::Enrolment(_) => "enrolment",
            TaskResult::EnrolmentDelayed(_) => "enrolment_delayed",
            TaskResult::Verification(_) => "verification",
            TaskResult::VerificationDelayed(_) => "verification_delayed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            TaskResult::Validation(r) => r.status(),
            TaskResult::Enrolment(r) => r.status(),
            TaskResult::Verification(r) => r.status(),
            TaskResult::ValidationDelayed(_)
            | TaskResult::EnrolmentDelayed(_)
            | TaskResult::VerificationDelayed(_) => StatusCode::WaitingExternalService,
        }
    }
}

/// Callback the provider asks to receive at or after `when`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTask {
    pub key: String,
    pub when: DateTime<Utc>,
    pub info: Option<Value>,
}

impl NotificationTask {
    /// Fire after the default delay.
    pub fn new(key: impl Into<String>, info: Option<Value>) -> Self {
        Self::after(key, DEFAULT_NOTIFICATION_DELAY_SECS, info)
    }

    /// Fire `countdown_secs` seconds from now.
    pub fn after(key: impl Into<String>, countdown_secs: i64, info: Option<Value>) -> Self {
        Self::at(key, Utc::now() + Duration::seconds(countdown_secs), info)
    }

    /// Fire at an absolute time.
    pub fn at(key: impl Into<String>, when: DateTime<Utc>, info: Option<Value>) -> Self {
        Self {
            key: key.into(),
            when,
            info,
        }
    }

    /// Body sent to the storage API.
    pub fn to_payload(&self) -> Value {
        json!({
            "key": self.key,
            "when": self.when,
            "info": self.info,
        })
    }
}
