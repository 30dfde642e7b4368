use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Audit trail attached to a verification result.
///
/// `alerts` and `warnings` are common to every instrument; `detail` carries the
/// instrument-specific part and is flattened into the same JSON object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub detail: AuditDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditDetail {
    Plagiarism {
        documents: Value,
        total_documents: u32,
        total_documents_accepted: u32,
        total_documents_rejected: u32,
        #[serde(default)]
        comparisons: Vec<Comparison>,
    },
    Keystroke {
        num_samples_discarded: u32,
        num_features: u32,
    },
    FaceRecognition {
        faces: Vec<DetectedFace>,
    },
    Base {},
}

impl Default for AuditDetail {
    fn default() -> Self {
        AuditDetail::Base {}
    }
}

/// A face found in a verification request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedFace {
    pub coordinates: Option<Value>,
    /// Most similar enrolment sample id.
    pub most_similar_sample: Option<i64>,
    /// Base64 crop of the face region.
    pub image: Option<String>,
    pub info: Option<Value>,
    pub score: Option<f64>,
}

/// One document comparison performed by a plagiarism instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub comparison_id: i64,
    pub result: f64,
    #[serde(default)]
    pub extra_info: Value,
}

impl Audit {
    pub fn new(alerts: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            alerts,
            warnings,
            detail: AuditDetail::Base {},
        }
    }

    pub fn face_recognition(alerts: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            alerts,
            warnings,
            detail: AuditDetail::FaceRecognition { faces: Vec::new() },
        }
    }

    pub fn keystroke(num_samples_discarded: u32, num_features: u32) -> Self {
        Self {
            detail: AuditDetail::Keystroke {
                num_samples_discarded,
                num_features,
            },
            ..Default::default()
        }
    }

    pub fn plagiarism(documents: Value, total: u32, accepted: u32, rejected: u32) -> Self {
        Self {
            detail: AuditDetail::Plagiarism {
                documents,
                total_documents: total,
                total_documents_accepted: accepted,
                total_documents_rejected: rejected,
                comparisons: Vec::new(),
            },
            ..Default::default()
        }
    }

    /// Record a detected face. Ignored unless this is a face recognition audit.
    pub fn add_face(&mut self, face: DetectedFace) {
        if let AuditDetail::FaceRecognition { faces } = &mut self.detail {
            faces.push(face);
        }
    }

    /// Record a document comparison. Ignored unless this is a plagiarism audit.
    pub fn add_comparison(&mut self, comparison_id: i64, result: f64, extra_info: Option<Value>) {
        if let AuditDetail::Plagiarism { comparisons, .. } = &mut self.detail {
            comparisons.push(Comparison {
                comparison_id,
                result,
                extra_info: extra_info.unwrap_or_else(|| Value::Object(Default::default())),
            });
        }
    }
}
