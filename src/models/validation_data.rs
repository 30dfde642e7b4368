use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Instrument that produced a validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRef {
    pub id: i64,
    pub acronym: String,
}

/// Provider implementation that produced a validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub id: i64,
    pub acronym: String,
    pub version: String,
}

/// Fields shared by every validation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationBase {
    pub instrument: Option<InstrumentRef>,
    pub provider: Option<ProviderRef>,
    pub info: Option<Value>,
}

/// Face bounding box inside the sample image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub left: f64,
    pub top: f64,
    pub height: f64,
    pub width: f64,
}

/// Head pose estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub roll: f64,
    pub yaw: f64,
    pub pitch: f64,
}

/// Validation information attached to an enrolment sample, one variant per
/// instrument acronym.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationData {
    FaceRecognition {
        base: ValidationBase,
        face_location: Option<FaceLocation>,
        pose: Option<HeadPose>,
    },
}

impl ValidationData {
    /// Empty face recognition validation for the given instrument and provider.
    pub fn face_recognition(instrument: InstrumentRef, provider: ProviderRef) -> Self {
        ValidationData::FaceRecognition {
            base: ValidationBase {
                instrument: Some(instrument),
                provider: Some(provider),
                info: None,
            },
            face_location: None,
            pose: None,
        }
    }

    pub fn acronym(&self) -> &'static str {
        match self {
            ValidationData::FaceRecognition { .. } => "fr",
        }
    }

    pub fn base(&self) -> &ValidationBase {
        match self {
            ValidationData::FaceRecognition { base, .. } => base,
        }
    }

    pub fn set_info(&mut self, info: Value) {
        match self {
            ValidationData::FaceRecognition { base, .. } => base.info = Some(info),
        }
    }

    /// Parse a stored validation payload.
    ///
    /// Returns `None` when the payload lacks the shared keys, names an
    /// instrument without a typed variant, or misses the variant's own keys.
    pub fn parse(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let base = parse_base(object)?;
        let acronym = base.instrument.as_ref()?.acronym.clone();

        match acronym.as_str() {
            "fr" => {
                if !object.contains_key("face_location") || !object.contains_key("pose") {
                    return None;
                }
                Some(ValidationData::FaceRecognition {
                    base,
                    face_location: nullable(object, "face_location")?,
                    pose: nullable(object, "pose")?,
                })
            }
            // Voice and keystroke validations carry no typed fields yet.
            "vr" | "ks" => None,
            _ => None,
        }
    }

    /// JSON representation accepted by [`ValidationData::parse`].
    pub fn to_representation(&self) -> Value {
        match self {
            ValidationData::FaceRecognition {
                base,
                face_location,
                pose,
            } => json!({
                "provider": base.provider,
                "instrument": base.instrument,
                "info": base.info,
                "face_location": face_location,
                "pose": pose,
            }),
        }
    }
}

fn parse_base(object: &Map<String, Value>) -> Option<ValidationBase> {
    if !["provider", "instrument", "info"]
        .iter()
        .all(|key| object.contains_key(*key))
    {
        return None;
    }

    Some(ValidationBase {
        instrument: nullable(object, "instrument")?,
        provider: nullable(object, "provider")?,
        info: object.get("info").filter(|v| !v.is_null()).cloned(),
    })
}

/// Decode an optional key: `Some(None)` for null, `None` when malformed.
fn nullable<T: serde::de::DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<Option<T>> {
    match object.get(key) {
        None | Some(Value::Null) => Some(None),
        Some(value) => serde_json::from_value(value.clone()).ok().map(Some),
    }
}
