use strum::{Display, EnumString};

/// Message codes a provider attaches to validation and verification results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderMessage {
    ProviderMultiplePeople,
    ProviderIncompleteEnrolment,
    ProviderNoFaceDetected,
    ProviderInvalidMimetype,
    ProviderMissingMimetype,
    ProviderInvalidSampleData,
    ProviderBlackImage,
    ProviderExternalServiceDown,
    ProviderExternalServiceTimeout,
}
