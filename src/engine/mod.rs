//! The driver loop: sequences the five steps of a run, routes after review
//! and turns every outcome into a terminal `WorkflowState`.
//!
//! All status changes go through `WorkflowStateMachine`; the engine only
//! decides which command to apply next.

mod cancel;
mod observer;

pub use cancel::{CancelHandle, CancelToken};
pub use observer::{ChannelObserver, ProgressObserver};

use crate::config::DEFAULT_RETRY_CEILING;
use crate::domain::{StepKind, WorkflowId};
use crate::router::{self, RouteDecision};
use crate::state::WorkflowState;
use crate::state_machine::{StateCommand, StateEvent, StateSnapshot, WorkflowStateMachine};
use crate::steps::StepSet;
use crate::structured_logger::StructuredLogger;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    /// Assigned up front so callers can place output before the run starts.
    pub workflow_id: WorkflowId,
    pub topic: String,
    pub industry: String,
    pub target_audience: String,
    pub requirements: Vec<String>,
    pub retry_ceiling: u32,
}

impl WorkflowRequest {
    pub fn new(
        topic: impl Into<String>,
        industry: impl Into<String>,
        target_audience: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: WorkflowId::new(),
            topic: topic.into(),
            industry: industry.into(),
            target_audience: target_audience.into(),
            requirements: Vec::new(),
            retry_ceiling: DEFAULT_RETRY_CEILING,
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_retry_ceiling(mut self, retry_ceiling: u32) -> Self {
        self.retry_ceiling = retry_ceiling;
        self
    }

    fn into_state(self) -> WorkflowState {
        let mut state = WorkflowState::new(&self.topic, &self.industry, &self.target_audience)
            .with_requirements(self.requirements);
        state.workflow_id = self.workflow_id;
        state
    }
}

/// Runs workflows against a fixed `StepSet`.
///
/// Holds no per-run state, so one engine can drive many runs concurrently.
pub struct WorkflowEngine {
    steps: StepSet,
    logger: Arc<StructuredLogger>,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl WorkflowEngine {
    pub fn new(steps: StepSet) -> Self {
        Self {
            steps,
            logger: Arc::new(StructuredLogger::disabled()),
            observers: Vec::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<StructuredLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Drives one run to a terminal status.
    ///
    /// Expected failures (step failures, contract violations, cancellation)
    /// are recorded in `errors` with `status = failed`; this never errors.
    pub async fn run(&self, request: WorkflowRequest, cancel: CancelToken) -> WorkflowState {
        let retry_ceiling = request.retry_ceiling;
        let mut machine = WorkflowStateMachine::new(request.into_state(), Arc::clone(&self.logger));
        let workflow_id = machine.state().workflow_id;

        info!(%workflow_id, topic = %machine.state().topic, retry_ceiling, "Starting workflow");
        self.notify(&machine.snapshot());
        self.apply(&mut machine, StateCommand::StartRun);

        while !machine.state().is_terminal() {
            let step = match machine.next_step() {
                Some(step) => step,
                None => match self.route(&mut machine, retry_ceiling) {
                    Some(step) => step,
                    None => continue,
                },
            };

            if cancel.is_cancelled() {
                warn!(%workflow_id, %step, "Cancellation requested; stopping before step");
                self.apply(&mut machine, StateCommand::Cancel { next_step: step });
                continue;
            }

            let command = self.execute_step(&machine, step).await;
            self.apply(&mut machine, command);
        }

        let state = machine.into_state();
        self.logger.log_run_complete(&state);
        info!(
            %workflow_id,
            status = %state.status,
            retry_count = state.retry_count,
            tokens_used = state.tokens_used,
            approved = state.is_approved(),
            "Workflow finished"
        );
        state
    }

    /// Consults the router at the review gate. Returns the step to run next
    /// when revising, `None` once the run is terminal.
    fn route(&self, machine: &mut WorkflowStateMachine, retry_ceiling: u32) -> Option<StepKind> {
        let state = machine.state();
        let Some(review) = state.review_result.as_ref() else {
            self.apply(
                machine,
                StateCommand::Abort {
                    step: StepKind::Review,
                    reason: "reviewed state carries no review result".to_string(),
                },
            );
            return None;
        };

        let decision = router::decide(review, state.retry_count, retry_ceiling);
        debug!(
            workflow_id = %state.workflow_id,
            score = review.score,
            approved = review.approved,
            retry_count = state.retry_count,
            ?decision,
            "Routing after review"
        );

        match decision {
            RouteDecision::Finish => {
                self.apply(machine, StateCommand::Complete);
                None
            }
            RouteDecision::Revise => {
                self.apply(machine, StateCommand::BeginRevision)
                    .then_some(StepKind::Draft)
            }
        }
    }

    async fn execute_step(&self, machine: &WorkflowStateMachine, step: StepKind) -> StateCommand {
        let state = machine.state();
        let workflow_id = state.workflow_id;
        self.logger
            .log_step_invocation(&workflow_id, step, state.retry_count);
        info!(%workflow_id, "Running {}", step.with_revision(state.retry_count));

        match self.steps.get(step).execute(state.clone()).await {
            Ok(next) => {
                self.logger.log_step_complete(&workflow_id, step, true);
                StateCommand::ApplyStepResult {
                    step,
                    state: Box::new(next),
                }
            }
            Err(failure) => {
                self.logger.log_step_complete(&workflow_id, step, false);
                warn!(
                    %workflow_id,
                    %step,
                    kind = failure.kind.display_name(),
                    retryable = failure.is_retryable(),
                    "Step failed: {}",
                    failure.message
                );
                StateCommand::RecordStepFailure { step, failure }
            }
        }
    }

    /// Applies a command and notifies observers of any status change.
    /// A rejected command aborts the run. Returns whether the command applied.
    fn apply(&self, machine: &mut WorkflowStateMachine, command: StateCommand) -> bool {
        let step = command_step(&command);
        match machine.apply(command) {
            Ok(events) => {
                self.notify_if_changed(machine, &events);
                true
            }
            Err(e) => {
                error!(workflow_id = %machine.state().workflow_id, "Command rejected: {}", e);
                if !machine.state().is_terminal() {
                    let abort = StateCommand::Abort {
                        step,
                        reason: e.to_string(),
                    };
                    match machine.apply(abort) {
                        Ok(events) => self.notify_if_changed(machine, &events),
                        Err(e) => error!("Failed to abort workflow: {}", e),
                    }
                }
                false
            }
        }
    }

    fn notify_if_changed(&self, machine: &WorkflowStateMachine, events: &[StateEvent]) {
        if events
            .iter()
            .any(|e| matches!(e, StateEvent::StatusChanged { .. }))
        {
            self.notify(&machine.snapshot());
        }
    }

    fn notify(&self, snapshot: &StateSnapshot) {
        for observer in &self.observers {
            observer.on_transition(snapshot);
        }
    }
}

/// The step an abort of `command` is attributed to.
fn command_step(command: &StateCommand) -> StepKind {
    match command {
        StateCommand::ApplyStepResult { step, .. }
        | StateCommand::RecordStepFailure { step, .. }
        | StateCommand::Abort { step, .. } => *step,
        StateCommand::Cancel { next_step } => *next_step,
        StateCommand::StartRun => StepKind::Plan,
        StateCommand::BeginRevision => StepKind::Draft,
        StateCommand::Complete => StepKind::Review,
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
