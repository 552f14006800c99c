//! Shared error type across quotagate crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Subject or directory pool could not be resolved.
    NotFound,
    /// Missing or malformed input.
    InvalidInput,
    /// Upload quota already used up.
    QuotaExceeded,
    /// Directory throttled us past the retry budget.
    Throttled,
    /// Sign-up or confirmation refused by registration rules.
    RegistrationRejected,
    /// Sign-in refused by network rules.
    AccessDenied,
    /// Anything unclassified.
    Unexpected,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::InvalidInput => "INVALID_INPUT",
            ClientCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ClientCode::Throttled => "THROTTLED",
            ClientCode::RegistrationRejected => "REGISTRATION_REJECTED",
            ClientCode::AccessDenied => "ACCESS_DENIED",
            ClientCode::Unexpected => "UNEXPECTED",
        }
    }

    /// HTTP status the request boundary reports for this code.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::NotFound => 404,
            ClientCode::InvalidInput => 400,
            ClientCode::QuotaExceeded => 403,
            ClientCode::Throttled => 503,
            ClientCode::RegistrationRejected => 400,
            ClientCode::AccessDenied => 403,
            ClientCode::Unexpected => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, QuotaGateError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaGateError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("You have already reached the limit of {max_files_allowed} PDF uploads.")]
    QuotaExceeded { max_files_allowed: u32 },
    #[error("throttled: {0}")]
    Throttled(String),
    #[error("{0}")]
    RegistrationRejected(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("{0}")]
    Unexpected(String),
}

impl QuotaGateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            QuotaGateError::NotFound(_) => ClientCode::NotFound,
            QuotaGateError::InvalidInput(_) => ClientCode::InvalidInput,
            QuotaGateError::QuotaExceeded { .. } => ClientCode::QuotaExceeded,
            QuotaGateError::Throttled(_) => ClientCode::Throttled,
            QuotaGateError::RegistrationRejected(_) => ClientCode::RegistrationRejected,
            QuotaGateError::AccessDenied(_) => ClientCode::AccessDenied,
            QuotaGateError::Unexpected(_) => ClientCode::Unexpected,
        }
    }

    /// Transient errors worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuotaGateError::Throttled(_))
    }
}
