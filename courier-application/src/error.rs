use courier_domain::error::DomainError;
use std::time::Duration;
use uuid::Uuid;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("infra: {0}")]
    Infra(String),

    #[error("handler not found: {0}")]
    HandlerNotFound(&'static str),

    #[error("handler already registered: command={command}")]
    AlreadyRegisteredCommand { command: &'static str },

    #[error("job already registered: command={command}")]
    AlreadyRegisteredJob { command: &'static str },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("command timed out: command={command}, limit={limit:?}")]
    Timeout { command: String, limit: Duration },

    #[error("job result unavailable: tracking_id={tracking_id}")]
    JobResultUnavailable { tracking_id: Uuid },
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Domain(DomainError::from(err))
    }
}
