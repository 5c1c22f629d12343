//! Commands that can mutate workflow state.
//!
//! All state changes MUST go through the state machine's `apply()` method.

use crate::domain::{StepFailure, StepKind};
use crate::state::WorkflowState;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub enum StateCommand {
    /// Stamp the run as started. Valid only in `init`.
    StartRun,
    /// Swap in the state a step returned, after contract verification.
    ApplyStepResult {
        step: StepKind,
        state: Box<WorkflowState>,
    },
    /// A step reported it could not complete.
    RecordStepFailure { step: StepKind, failure: StepFailure },
    /// Cancellation observed before `next_step` was invoked.
    Cancel { next_step: StepKind },
    /// Router said revise: bump the retry counter before re-drafting.
    BeginRevision,
    /// Router said finish.
    Complete,
    /// Driver hit an internal defect; fail the run with a contract violation.
    Abort { step: StepKind, reason: String },
}

impl StateCommand {
    pub fn name(&self) -> &'static str {
        match self {
            StateCommand::StartRun => "StartRun",
            StateCommand::ApplyStepResult { .. } => "ApplyStepResult",
            StateCommand::RecordStepFailure { .. } => "RecordStepFailure",
            StateCommand::Cancel { .. } => "Cancel",
            StateCommand::BeginRevision => "BeginRevision",
            StateCommand::Complete => "Complete",
            StateCommand::Abort { .. } => "Abort",
        }
    }

    /// Compact log form; step results are summarized, not dumped.
    pub fn describe(&self) -> Value {
        match self {
            StateCommand::ApplyStepResult { step, state } => json!({
                "type": self.name(),
                "step": step,
                "status": state.status,
                "tokens_used": state.tokens_used,
            }),
            StateCommand::RecordStepFailure { step, failure } => json!({
                "type": self.name(),
                "step": step,
                "failure": failure,
            }),
            StateCommand::Cancel { next_step } => json!({
                "type": self.name(),
                "next_step": next_step,
            }),
            StateCommand::Abort { step, reason } => json!({
                "type": self.name(),
                "step": step,
                "reason": reason,
            }),
            _ => json!({ "type": self.name() }),
        }
    }
}
