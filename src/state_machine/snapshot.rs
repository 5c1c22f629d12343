//! Read-only snapshot of workflow state for observers.

use crate::domain::WorkflowId;
use crate::state::{WorkflowState, WorkflowStatus};
use std::sync::Arc;

/// Observers never mutate this; they receive a new snapshot per transition.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Number of commands applied so far in this run.
    pub seq: u64,
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    pub retry_count: u32,
    pub tokens_used: u64,
    pub error_count: usize,
    /// Full copy of the state at this point.
    pub state: Arc<WorkflowState>,
}

impl StateSnapshot {
    pub fn capture(seq: u64, state: &WorkflowState) -> Self {
        Self {
            seq,
            workflow_id: state.workflow_id,
            status: state.status,
            retry_count: state.retry_count,
            tokens_used: state.tokens_used,
            error_count: state.errors.len(),
            state: Arc::new(state.clone()),
        }
    }
}
