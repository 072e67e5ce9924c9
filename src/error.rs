use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OsintError>;

#[derive(Debug, Error)]
pub enum OsintError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("rate limit exceeded for `{key}`, retry in {:.1}s", retry_after.as_secs_f64())]
    RateLimitExceeded { key: String, retry_after: Duration },
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Wire-level error categories shared by every transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Forbidden,
    RateLimited,
    Unavailable,
    ExecutionFailed,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::ExecutionFailed => "execution_failed",
        }
    }
}

impl OsintError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        OsintError::InvalidInput(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        OsintError::Forbidden(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        OsintError::Unavailable(message.into())
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        OsintError::ExecutionFailed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OsintError::InvalidInput(_) => ErrorKind::InvalidInput,
            OsintError::Forbidden(_) => ErrorKind::Forbidden,
            OsintError::RateLimitExceeded { .. } => ErrorKind::RateLimited,
            OsintError::Unavailable(_) => ErrorKind::Unavailable,
            OsintError::ExecutionFailed(_)
            | OsintError::Config(_)
            | OsintError::Serialization(_)
            | OsintError::Other(_) => ErrorKind::ExecutionFailed,
        }
    }

    /// Whether the error is an expected condition the dispatcher passes through
    /// untouched.
    pub fn is_passthrough(&self) -> bool {
        matches!(
            self,
            OsintError::InvalidInput(_)
                | OsintError::Forbidden(_)
                | OsintError::RateLimitExceeded { .. }
                | OsintError::Unavailable(_)
                | OsintError::ExecutionFailed(_)
        )
    }

    /// Message safe to hand back to a client. Internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            OsintError::InvalidInput(msg) | OsintError::Unavailable(msg) => msg.clone(),
            OsintError::Forbidden(_) => "not permitted".to_string(),
            OsintError::RateLimitExceeded { key, .. } => {
                format!("rate limit exceeded for `{key}`, try again later")
            }
            OsintError::ExecutionFailed(msg) => msg.clone(),
            OsintError::Config(_) => "tool is misconfigured".to_string(),
            OsintError::Serialization(_) => "malformed tool output".to_string(),
            OsintError::Other(_) => "internal error".to_string(),
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            OsintError::RateLimitExceeded { key, retry_after } => Some(json!({
                "key": key,
                "retry_after_secs": (retry_after.as_secs_f64() * 10.0).ceil() / 10.0,
            })),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for OsintError {
    fn from(err: serde_json::Error) -> Self {
        OsintError::Serialization(err.to_string())
    }
}
