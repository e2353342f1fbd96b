use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NoTarget,
    ApiUnavailable,
    InvalidArg,
    InvalidState,
    NotFound,
    InputNotFound,
    InvalidField,
    ShadowCreateFailed,
    ConnectionFailed,
    SetFailed,
    ExecutionError,
    Unsupported,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NoTarget => "NO_TARGET",
            ErrorKind::ApiUnavailable => "API_UNAVAILABLE",
            ErrorKind::InvalidArg => "INVALID_ARG",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InputNotFound => "INPUT_NOT_FOUND",
            ErrorKind::InvalidField => "INVALID_FIELD",
            ErrorKind::ShadowCreateFailed => "SHADOW_CREATE_FAILED",
            ErrorKind::ConnectionFailed => "CONNECTION_FAILED",
            ErrorKind::SetFailed => "SET_FAILED",
            ErrorKind::ExecutionError => "EXECUTION_ERROR",
            ErrorKind::Unsupported => "UNSUPPORTED",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a graph operation. Carries a kind callers can branch on and an
/// optional structured payload (e.g. the legal input names of a block).
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArg, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::ExecutionError, format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_as_wire_name() {
        assert_eq!(
            serde_json::to_value(ErrorKind::InputNotFound).unwrap(),
            json!("INPUT_NOT_FOUND")
        );
        assert_eq!(ErrorKind::ShadowCreateFailed.as_str(), "SHADOW_CREATE_FAILED");
    }

    #[test]
    fn anyhow_errors_become_execution_errors() {
        let err: ApiError = anyhow::anyhow!("Missing block 'x'.").into();
        assert_eq!(err.kind, ErrorKind::ExecutionError);
        assert_eq!(err.message, "Missing block 'x'.");
        assert_eq!(err.to_string(), "EXECUTION_ERROR: Missing block 'x'.");
    }
}
