//! Error types for Surveyor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("scope violation: {0}")]
    ScopeViolation(String),

    #[error("adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("adapter error: {adapter} - {message}")]
    AdapterError { adapter: String, message: String },

    #[error("run was canceled")]
    Canceled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Join a list of constraint violations into one validation error.
    pub fn validation_all(errors: &[String]) -> Self {
        Self::Validation(errors.join("; "))
    }

    pub fn adapter_error(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterError {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// The message surfaced to external callers. Internal errors are not
    /// leaked verbatim past the engine boundary.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) | Self::Io(_) | Self::Json(_) => {
                "Run failed unexpectedly".to_string()
            }
            other => other.to_string(),
        }
    }
}
