//! Structured failure types reported by step units.
//!
//! A step never panics or bubbles an opaque error to the engine. It returns a
//! `StepFailure` whose `FailureKind` classifies what went wrong, so the engine
//! can record it and the caller can decide whether a later attempt may help.

use serde::{Deserialize, Serialize};

/// Canonical failure types for step and service failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backing service did not answer within its deadline.
    Timeout,
    /// Network-related error detected from stderr patterns.
    Network,
    /// Non-zero exit code from the service process.
    ProcessExit(i32),
    /// Output parsing failed with the given error message.
    ParseFailure(String),
    /// Service produced no output.
    EmptyOutput,
    /// A required field of the workflow state was missing.
    Precondition(String),
    /// Unclassified errors.
    Unknown(String),
}

impl FailureKind {
    /// Returns true if this failure type is potentially recoverable via retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::Network | FailureKind::EmptyOutput
        )
    }

    /// Returns a human-readable name for this failure type.
    pub fn display_name(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "Timeout",
            FailureKind::Network => "Network",
            FailureKind::ProcessExit(_) => "Process Exit",
            FailureKind::ParseFailure(_) => "Parse Failure",
            FailureKind::EmptyOutput => "Empty Output",
            FailureKind::Precondition(_) => "Precondition",
            FailureKind::Unknown(_) => "Unknown",
        }
    }
}

/// Failure value returned by a step or service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// A required input field is absent from the state handed to the step.
    pub fn precondition(field: &str) -> Self {
        Self::new(
            FailureKind::Precondition(field.to_string()),
            format!("required field `{}` is not populated", field),
        )
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(
            FailureKind::ParseFailure(reason.clone()),
            format!("could not parse service output: {}", reason),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.display_name(), self.message)
    }
}

impl std::error::Error for StepFailure {}

/// Regex pattern for classifying network errors from stderr.
pub const NETWORK_ERROR_PATTERN: &str =
    r"(?i)connect|network|ECONNREFUSED|ETIMEDOUT|connection\s+refused|name\s+resolution|DNS|socket";
