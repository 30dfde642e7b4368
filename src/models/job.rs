use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Handler names registered with the job runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskName {
    Enrol,
    Validate,
    Verify,
    Notify,
}

/// Arguments of one job, tagged by the handler that runs it. Only primitive
/// identifiers travel through the queue; everything else is fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum JobKind {
    Enrol {
        #[garde(length(min = 1, max = 64))]
        learner_id: String,
        #[serde(default)]
        #[garde(skip)]
        sample_id: Option<i64>,
    },
    Validate {
        #[garde(length(min = 1, max = 64))]
        learner_id: String,
        #[garde(range(min = 1))]
        sample_id: i64,
        #[garde(range(min = 1))]
        validation_id: i64,
    },
    Verify {
        #[garde(range(min = 1))]
        request_id: i64,
        #[garde(range(min = 1))]
        result_id: i64,
    },
    Notify {
        #[garde(range(min = 1))]
        notification_id: i64,
    },
}

impl JobKind {
    pub fn name(&self) -> TaskName {
        match self {
            JobKind::Enrol { .. } => TaskName::Enrol,
            JobKind::Validate { .. } => TaskName::Validate,
            JobKind::Verify { .. } => TaskName::Verify,
            JobKind::Notify { .. } => TaskName::Notify,
        }
    }
}

/// Request body for submitting a job over HTTP.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[serde(flatten)]
    #[garde(dive)]
    pub job: JobKind,

    /// Target queue; defaults to the first configured queue.
    #[garde(length(min = 1, max = 128))]
    pub queue: Option<String>,
}

/// Response after submitting a job.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: uuid::Uuid,
    pub task: TaskName,
    pub queue: String,
}
