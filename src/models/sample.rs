use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::validation_data::ValidationData;

/// Payload captured by a sensor, as stored behind a blob URL.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorData {
    /// Base64 encoded sample content.
    pub data: Option<String>,
    pub metadata: Option<Value>,
    pub instruments: Option<Vec<i64>>,
}

impl SensorData {
    pub fn context(&self) -> Option<&Value> {
        self.metadata.as_ref()?.get("context")
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("mimetype")?.as_str()
    }

    /// Decode the base64 content. `None` when absent or not valid base64.
    pub fn decode(&self) -> Option<Vec<u8>> {
        let encoded = self.data.as_deref()?;
        // Sensors send data URLs as often as bare base64.
        let encoded = encoded
            .split_once(";base64,")
            .map(|(_, rest)| rest)
            .unwrap_or(encoded);
        base64::engine::general_purpose::STANDARD.decode(encoded).ok()
    }
}

/// One enrolment datum, hydrated for a provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub sample_id: i64,
    pub learner_id: String,
    pub data: SensorData,
    pub validations: Vec<ValidationData>,
}

impl Sample {
    pub fn payload(&self) -> Option<&str> {
        self.data.data.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.data.mime_type()
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.data.metadata.as_ref()
    }

    pub fn context(&self) -> Option<&Value> {
        self.data.context()
    }

    pub fn instruments(&self) -> &[i64] {
        self.data.instruments.as_deref().unwrap_or_default()
    }
}

/// Payload of a verification request once downloaded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestData {
    pub learner_id: Option<String>,
    pub course_id: Option<i64>,
    pub activity_id: Option<i64>,
    pub session_id: Option<i64>,
    #[serde(flatten)]
    pub sensor: SensorData,
}

/// One verification datum, hydrated for a provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_id: i64,
    pub data: RequestData,
}

impl Request {
    pub fn learner_id(&self) -> Option<&str> {
        self.data.learner_id.as_deref()
    }

    pub fn course_id(&self) -> Option<i64> {
        self.data.course_id
    }

    pub fn activity_id(&self) -> Option<i64> {
        self.data.activity_id
    }

    pub fn session_id(&self) -> Option<i64> {
        self.data.session_id
    }

    pub fn payload(&self) -> Option<&str> {
        self.data.sensor.data.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.data.sensor.mime_type()
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.data.sensor.metadata.as_ref()
    }

    pub fn context(&self) -> Option<&Value> {
        self.data.sensor.context()
    }

    pub fn instruments(&self) -> &[i64] {
        self.data.sensor.instruments.as_deref().unwrap_or_default()
    }
}

/// Enrolment sample as listed by the storage API. `data` is a blob URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub id: i64,
    pub learner_id: String,
    pub data: String,
}

/// Validation of a sample as listed by the storage API. `info` is a blob URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: i64,
    pub info: Option<String>,
}

/// Single sample validation, embedding the sample it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleValidationRecord {
    pub id: i64,
    pub sample: SampleRecord,
}

/// Request reference inside a request result. `data` is a blob URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: i64,
    pub data: String,
}

/// Placeholder the storage API keeps for one provider's verdict on a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResultRecord {
    pub id: i64,
    pub learner_id: String,
    pub request: RequestRecord,
}

/// Scheduled notification stored by the storage API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub key: String,
    pub info: Option<Value>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub results: Vec<T>,
}
