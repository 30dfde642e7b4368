use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Progress of one enrolment job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnrolmentState {
    Start,
    LockAcquired,
    ModelHydrated,
    SamplesFetched,
    Delegated,
    ResultClassified,
    Persisted,
    Reconciled,
    Done,
    /// Failed after the lock was taken; the lock has been dealt with.
    UnlockedFailed,
}

impl EnrolmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::UnlockedFailed)
    }

    /// Whether `next` may follow `self`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use EnrolmentState::*;
        match (self, next) {
            (Start, LockAcquired)
            | (LockAcquired, ModelHydrated)
            | (ModelHydrated, SamplesFetched)
            | (SamplesFetched, Delegated)
            | (Delegated, ResultClassified)
            | (ResultClassified, Persisted)
            | (Persisted, Reconciled)
            | (Reconciled, Done) => true,
            (from, UnlockedFailed) => !from.is_terminal() && *from != Start,
            _ => false,
        }
    }
}
