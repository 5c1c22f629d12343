//! Structured JSONL logger for debugging and run reconstruction.
//!
//! This module provides machine-parseable logging with:
//! - Monotonic sequence numbers for ordering
//! - ISO 8601 timestamps with microsecond precision
//! - Workflow IDs for correlating interleaved runs
//! - Structured event data in JSON format

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::domain::{StepKind, WorkflowError, WorkflowId};
use crate::state::WorkflowState;
use crate::state_machine::{StateCommand, StateEvent};

/// Structured JSONL logger. Safe to share between concurrent runs.
pub struct StructuredLogger {
    seq: AtomicU64,
    log_file: Option<Mutex<File>>,
}

/// A single log entry in JSONL format.
#[derive(Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number (unique across the log file)
    pub seq: u64,
    /// ISO 8601 timestamp with microseconds
    pub ts: String,
    pub workflow_id: Option<String>,
    /// Component that emitted the log
    pub component: String,
    /// Structured event data
    pub event: Value,
}

impl StructuredLogger {
    /// Creates a logger appending to `<logs_dir>/events.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The logs directory cannot be created
    /// - The log file cannot be opened
    pub fn new(logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            seq: AtomicU64::new(0),
            log_file: Some(Mutex::new(file)),
        })
    }

    /// A logger that drops every entry.
    pub fn disabled() -> Self {
        Self {
            seq: AtomicU64::new(0),
            log_file: None,
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logs a structured event.
    ///
    /// The event is serialized to JSON and written as a single line.
    /// This method is thread-safe.
    pub fn log(&self, component: &str, workflow_id: Option<&WorkflowId>, event: impl Serialize) {
        let Some(log_file) = &self.log_file else {
            return;
        };
        let entry = LogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            workflow_id: workflow_id.map(|id| id.to_string()),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    /// Logs a command received by a state machine.
    pub fn log_command(&self, workflow_id: &WorkflowId, machine_seq: u64, command: &StateCommand) {
        self.log(
            "StateMachine",
            Some(workflow_id),
            serde_json::json!({
                "type": "Command",
                "machine_seq": machine_seq,
                "command": command.describe(),
            }),
        );
    }

    /// Logs an event emitted by a state machine.
    pub fn log_event(&self, workflow_id: &WorkflowId, machine_seq: u64, event: &StateEvent) {
        self.log(
            "StateMachine",
            Some(workflow_id),
            serde_json::json!({
                "type": "Event",
                "machine_seq": machine_seq,
                "event": event,
            }),
        );
    }

    /// Logs a command the state machine refused.
    pub fn log_rejected(&self, workflow_id: &WorkflowId, machine_seq: u64, error: &WorkflowError) {
        self.log(
            "StateMachine",
            Some(workflow_id),
            serde_json::json!({
                "type": "Rejected",
                "machine_seq": machine_seq,
                "error": error.to_string(),
            }),
        );
    }

    /// Logs a contract violation together with the offending state.
    pub fn log_contract_violation(
        &self,
        workflow_id: &WorkflowId,
        step: StepKind,
        message: &str,
        state: &WorkflowState,
    ) {
        self.log(
            "StateMachine",
            Some(workflow_id),
            serde_json::json!({
                "type": "ContractViolation",
                "step": step,
                "message": message,
                "state": state,
            }),
        );
    }

    /// Logs a step invocation.
    pub fn log_step_invocation(&self, workflow_id: &WorkflowId, step: StepKind, retry_count: u32) {
        self.log(
            "Engine",
            Some(workflow_id),
            serde_json::json!({
                "type": "StepInvoked",
                "step": step,
                "retry_count": retry_count,
            }),
        );
    }

    /// Logs a step completion event.
    pub fn log_step_complete(&self, workflow_id: &WorkflowId, step: StepKind, success: bool) {
        self.log(
            "Engine",
            Some(workflow_id),
            serde_json::json!({
                "type": "StepComplete",
                "step": step,
                "success": success,
            }),
        );
    }

    /// Logs the terminal outcome of a run.
    pub fn log_run_complete(&self, state: &WorkflowState) {
        self.log(
            "Engine",
            Some(&state.workflow_id),
            serde_json::json!({
                "type": "RunComplete",
                "status": state.status,
                "retry_count": state.retry_count,
                "tokens_used": state.tokens_used,
                "approved": state.is_approved(),
                "error_count": state.errors.len(),
            }),
        );
    }
}

#[cfg(test)]
#[path = "tests/structured_logger_tests.rs"]
mod tests;
