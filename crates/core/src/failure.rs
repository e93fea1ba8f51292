//! Structured handler failure.

use std::sync::Arc;

use serde::Serialize;

/// What kind of failure ended a handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Handler returned an error
    Error,
    /// Handler panicked
    Panic,
    /// Handler task was cancelled before completing
    Cancelled,
}

/// A handler failure with its full cause.
///
/// In-process hooks see the whole value; the status history only stores
/// [`JobFailure::message`].
#[derive(Debug, Clone)]
pub struct JobFailure {
    kind: FailureKind,
    message: String,
    cause: Option<Arc<anyhow::Error>>,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn from_error(error: anyhow::Error) -> Self {
        Self {
            kind: FailureKind::Error,
            message: error.to_string(),
            cause: Some(Arc::new(error)),
        }
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Panic, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "handler task was cancelled")
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_deref()
    }
}

impl core::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for JobFailure {}

impl From<anyhow::Error> for JobFailure {
    fn from(value: anyhow::Error) -> Self {
        Self::from_error(value)
    }
}
