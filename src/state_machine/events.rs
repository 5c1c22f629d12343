//! Events emitted by the state machine after processing commands.
//!
//! These are for logging and notification purposes only. Observers get
//! state through `StateSnapshot`.

use crate::domain::{ErrorKind, StepKind, WorkflowId};
use crate::state::WorkflowStatus;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StateEvent {
    RunStarted { workflow_id: WorkflowId },
    /// A step result passed verification and replaced the state.
    StepApplied { step: StepKind, tokens_used: u64 },
    StatusChanged {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
    RetryIncremented { new_value: u32 },
    ErrorRecorded {
        kind: ErrorKind,
        step: Option<StepKind>,
        message: String,
    },
    /// Finished without approval because the retry budget ran out.
    RetryCeilingReached { retry_count: u32 },
    WorkflowCompleted { approved: bool, forced: bool },
    WorkflowFailed { error_count: usize },
}
