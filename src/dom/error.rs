use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomErrorCode {
    InvalidCallSignature,
    InvalidSelector,
    HierarchyRequest,
}

impl DomErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomErrorCode::InvalidCallSignature => "dom/invalid-call-signature",
            DomErrorCode::InvalidSelector => "dom/invalid-selector",
            DomErrorCode::HierarchyRequest => "dom/hierarchy-request",
        }
    }
}

#[derive(Clone, Debug)]
pub struct DomError {
    pub code: DomErrorCode,
    message: String,
}

impl DomError {
    pub fn new(code: DomErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for DomError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for DomError {}

pub type DomResult<T> = Result<T, DomError>;

pub fn invalid_call_signature(message: impl Into<String>) -> DomError {
    DomError::new(DomErrorCode::InvalidCallSignature, message)
}

pub fn invalid_selector(message: impl Into<String>) -> DomError {
    DomError::new(DomErrorCode::InvalidSelector, message)
}

pub fn hierarchy_request(message: impl Into<String>) -> DomError {
    DomError::new(DomErrorCode::HierarchyRequest, message)
}
