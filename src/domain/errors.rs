//! Error types for the workflow domain.

use crate::domain::failure::{FailureKind, StepFailure};
use crate::domain::types::{StepKind, TimestampUtc};
use crate::state::WorkflowStatus;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Kinds of errors recorded in `WorkflowState::errors`.
///
/// Reaching the retry ceiling is deliberately absent: a forced finish is a
/// completed run whose review is not approved, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A step reported it could not complete.
    StepExecutionFailure,
    /// A step returned a state that breaks the step contract.
    ContractViolation,
    /// Cooperative cancellation observed between steps.
    CancelledByCaller,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StepExecutionFailure => "step_execution_failure",
            ErrorKind::ContractViolation => "contract_violation",
            ErrorKind::CancelledByCaller => "cancelled_by_caller",
        }
    }
}

/// One entry of the append-only error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Step that was executing (or about to execute) when the error occurred.
    pub step: Option<StepKind>,
    pub message: String,
    pub retryable: bool,
    /// Classified step failure, present for `StepExecutionFailure`.
    #[serde(default)]
    pub failure: Option<FailureKind>,
    pub at: TimestampUtc,
}

impl ErrorRecord {
    pub fn step_failure(step: StepKind, failure: &StepFailure) -> Self {
        Self {
            kind: ErrorKind::StepExecutionFailure,
            step: Some(step),
            message: format!("{} step failed: {}", step, failure),
            retryable: failure.is_retryable(),
            failure: Some(failure.kind.clone()),
            at: TimestampUtc::now(),
        }
    }

    pub fn contract_violation(step: StepKind, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ContractViolation,
            step: Some(step),
            message: message.into(),
            retryable: false,
            failure: None,
            at: TimestampUtc::now(),
        }
    }

    pub fn cancelled(next_step: StepKind) -> Self {
        Self {
            kind: ErrorKind::CancelledByCaller,
            step: Some(next_step),
            message: format!("run cancelled before {} step", next_step),
            retryable: false,
            failure: None,
            at: TimestampUtc::now(),
        }
    }
}

impl Display for ErrorRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.at.to_rfc3339(), self.kind.as_str(), self.message)
    }
}

/// Errors raised by the state machine when a command cannot be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// Invalid status transition attempted.
    InvalidTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
    /// The run already reached `completed` or `failed`.
    Terminal { status: WorkflowStatus },
    /// A command arrived in a status where it has no meaning.
    InvalidCommand {
        command: &'static str,
        status: WorkflowStatus,
    },
    /// A step result broke the step contract.
    ContractViolation { step: StepKind, message: String },
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid transition: {} -> {}", from, to)
            }
            Self::Terminal { status } => write!(f, "workflow already terminal ({})", status),
            Self::InvalidCommand { command, status } => {
                write!(f, "{} is not valid in status {}", command, status)
            }
            Self::ContractViolation { step, message } => {
                write!(f, "contract violation in {} step: {}", step, message)
            }
        }
    }
}

impl std::error::Error for WorkflowError {}
