//! Centralized state machine for workflow state management.
//!
//! This module provides the ONLY place where state transitions happen.
//! The state machine owns the state, validates commands and emits events.
//! Snapshots are captured on demand for progress observers.

mod commands;
pub mod contract;
mod events;
mod snapshot;

pub use commands::StateCommand;
pub use events::StateEvent;
pub use snapshot::StateSnapshot;

use crate::domain::{ErrorRecord, StepKind, TimestampUtc, WorkflowError};
use crate::state::{WorkflowState, WorkflowStatus};
use crate::structured_logger::StructuredLogger;
use std::sync::Arc;

/// Owns the state of one run; validates commands and emits events.
pub struct WorkflowStateMachine {
    state: WorkflowState,
    logger: Arc<StructuredLogger>,
    seq: u64,
}

impl WorkflowStateMachine {
    /// Creates a new state machine with the given initial state.
    pub fn new(initial_state: WorkflowState, logger: Arc<StructuredLogger>) -> Self {
        Self {
            state: initial_state,
            logger,
            seq: 0,
        }
    }

    /// All mutations go through this single method.
    /// Returns the events the command produced; both are logged.
    pub fn apply(&mut self, command: StateCommand) -> Result<Vec<StateEvent>, WorkflowError> {
        self.seq += 1;
        let workflow_id = self.state.workflow_id;

        self.logger.log_command(&workflow_id, self.seq, &command);

        let events = match self.apply_internal(command) {
            Ok(events) => events,
            Err(e) => {
                self.logger.log_rejected(&workflow_id, self.seq, &e);
                return Err(e);
            }
        };

        for event in &events {
            self.logger.log_event(&workflow_id, self.seq, event);
        }
        Ok(events)
    }

    fn apply_internal(&mut self, command: StateCommand) -> Result<Vec<StateEvent>, WorkflowError> {
        use StateEvent::*;

        if self.state.is_terminal() {
            return Err(WorkflowError::Terminal {
                status: self.state.status,
            });
        }

        match command {
            StateCommand::StartRun => {
                self.require_status("StartRun", WorkflowStatus::Init)?;
                self.state.started_at = Some(TimestampUtc::now());
                Ok(vec![RunStarted {
                    workflow_id: self.state.workflow_id,
                }])
            }

            StateCommand::ApplyStepResult { step, state } => {
                if let Err(violation) = contract::verify_step_output(step, &self.state, &state) {
                    let message = violation.to_string();
                    self.logger
                        .log_contract_violation(&self.state.workflow_id, step, &message, &state);
                    tracing::error!(
                        workflow_id = %self.state.workflow_id,
                        %step,
                        state = %serde_json::to_string(&state).unwrap_or_default(),
                        "{}",
                        message
                    );
                    return self.fail(ErrorRecord::contract_violation(step, message));
                }
                let from = self.state.status;
                self.state = *state;
                Ok(vec![
                    StepApplied {
                        step,
                        tokens_used: self.state.tokens_used,
                    },
                    StatusChanged {
                        from,
                        to: self.state.status,
                    },
                ])
            }

            StateCommand::RecordStepFailure { step, failure } => {
                self.fail(ErrorRecord::step_failure(step, &failure))
            }

            StateCommand::Cancel { next_step } => self.fail(ErrorRecord::cancelled(next_step)),

            StateCommand::Abort { step, reason } => {
                self.fail(ErrorRecord::contract_violation(step, reason))
            }

            StateCommand::BeginRevision => {
                self.require_status("BeginRevision", WorkflowStatus::Reviewed)?;
                if self.state.is_approved() {
                    return Err(WorkflowError::InvalidCommand {
                        command: "BeginRevision",
                        status: self.state.status,
                    });
                }
                self.state.retry_count += 1;
                Ok(vec![RetryIncremented {
                    new_value: self.state.retry_count,
                }])
            }

            StateCommand::Complete => {
                let from = self.state.status;
                self.state.transition(WorkflowStatus::Completed)?;
                let approved = self.state.is_approved();
                let mut events = vec![StatusChanged {
                    from,
                    to: WorkflowStatus::Completed,
                }];
                if !approved {
                    events.push(RetryCeilingReached {
                        retry_count: self.state.retry_count,
                    });
                }
                events.push(WorkflowCompleted {
                    approved,
                    forced: !approved,
                });
                Ok(events)
            }
        }
    }

    fn require_status(
        &self,
        command: &'static str,
        status: WorkflowStatus,
    ) -> Result<(), WorkflowError> {
        if self.state.status == status {
            Ok(())
        } else {
            Err(WorkflowError::InvalidCommand {
                command,
                status: self.state.status,
            })
        }
    }

    /// Appends the error and moves to `failed`. Artifacts stay as they were.
    fn fail(&mut self, record: ErrorRecord) -> Result<Vec<StateEvent>, WorkflowError> {
        let from = self.state.status;
        let recorded = StateEvent::ErrorRecorded {
            kind: record.kind,
            step: record.step,
            message: record.message.clone(),
        };
        self.state.errors.push(record);
        self.state.transition(WorkflowStatus::Failed)?;
        Ok(vec![
            recorded,
            StateEvent::StatusChanged {
                from,
                to: WorkflowStatus::Failed,
            },
            StateEvent::WorkflowFailed {
                error_count: self.state.errors.len(),
            },
        ])
    }

    /// Returns immutable reference to current state.
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn into_state(self) -> WorkflowState {
        self.state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(self.seq, &self.state)
    }

    /// Next step the driver should run, or `None` once terminal or at the review gate.
    pub fn next_step(&self) -> Option<StepKind> {
        match self.state.status {
            WorkflowStatus::Init => Some(StepKind::Plan),
            WorkflowStatus::Planned => Some(StepKind::Research),
            WorkflowStatus::Researched => Some(StepKind::Draft),
            WorkflowStatus::Drafted => Some(StepKind::Format),
            WorkflowStatus::Formatted => Some(StepKind::Review),
            WorkflowStatus::Reviewed | WorkflowStatus::Completed | WorkflowStatus::Failed => None,
        }
    }
}
