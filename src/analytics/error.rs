use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyticsErrorCode {
    MissingMeasurementId,
    NotSetUp,
    AlreadySetUp,
    EventNameTooLong,
    TooManyParameters,
    ParameterKeyTooLong,
    ParameterValueTooLong,
    InvalidArgument,
    Internal,
    Network,
}

impl AnalyticsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsErrorCode::MissingMeasurementId => "analytics/missing-measurement-id",
            AnalyticsErrorCode::NotSetUp => "analytics/not-set-up",
            AnalyticsErrorCode::AlreadySetUp => "analytics/already-set-up",
            AnalyticsErrorCode::EventNameTooLong => "analytics/event-name-too-long",
            AnalyticsErrorCode::TooManyParameters => "analytics/too-many-parameters",
            AnalyticsErrorCode::ParameterKeyTooLong => "analytics/parameter-key-too-long",
            AnalyticsErrorCode::ParameterValueTooLong => "analytics/parameter-value-too-long",
            AnalyticsErrorCode::InvalidArgument => "analytics/invalid-argument",
            AnalyticsErrorCode::Internal => "analytics/internal",
            AnalyticsErrorCode::Network => "analytics/network",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnalyticsError {
    pub code: AnalyticsErrorCode,
    message: String,
}

impl AnalyticsError {
    pub fn new(code: AnalyticsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AnalyticsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for AnalyticsError {}

impl From<crate::dom::error::DomError> for AnalyticsError {
    fn from(err: crate::dom::error::DomError) -> Self {
        internal_error(err.to_string())
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

pub fn missing_measurement_id(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::MissingMeasurementId, message)
}

pub fn not_set_up() -> AnalyticsError {
    AnalyticsError::new(
        AnalyticsErrorCode::NotSetUp,
        "analytics tracker has not been set up; call `setup` first",
    )
}

pub fn already_set_up() -> AnalyticsError {
    AnalyticsError::new(
        AnalyticsErrorCode::AlreadySetUp,
        "analytics tracker has already been set up",
    )
}

pub fn event_name_too_long(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::EventNameTooLong, message)
}

pub fn too_many_parameters(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::TooManyParameters, message)
}

pub fn parameter_key_too_long(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::ParameterKeyTooLong, message)
}

pub fn parameter_value_too_long(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::ParameterValueTooLong, message)
}

pub fn invalid_argument(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Internal, message)
}

pub fn network_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Network, message)
}
