//! Strongly typed domain primitives for the workflow.
//!
//! These newtypes give identifiers, timestamps and step slots a semantic type
//! instead of passing bare strings and integers around the engine.

use crate::state::WorkflowStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    /// Creates a new random workflow ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters, used in document headers and log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string().chars().take(8).collect()
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UTC timestamp for state and error records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimestampUtc(pub DateTime<Utc>);

impl TimestampUtc {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the timestamp as an RFC3339 string.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for TimestampUtc {
    fn default() -> Self {
        Self::now()
    }
}

/// The five fixed step slots of a workflow run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Plan,
    Research,
    Draft,
    Format,
    Review,
}

impl StepKind {
    /// The mandatory forward pipeline.
    pub const PIPELINE: [StepKind; 5] = [
        StepKind::Plan,
        StepKind::Research,
        StepKind::Draft,
        StepKind::Format,
        StepKind::Review,
    ];

    /// The sub-sequence re-run on every revision pass.
    pub const REVISION: [StepKind; 3] = [StepKind::Draft, StepKind::Format, StepKind::Review];

    /// Status the state must carry after this step succeeds.
    pub fn produces(&self) -> WorkflowStatus {
        match self {
            StepKind::Plan => WorkflowStatus::Planned,
            StepKind::Research => WorkflowStatus::Researched,
            StepKind::Draft => WorkflowStatus::Drafted,
            StepKind::Format => WorkflowStatus::Formatted,
            StepKind::Review => WorkflowStatus::Reviewed,
        }
    }

    /// Steps whose output comes after this step's in the pipeline.
    pub fn downstream(&self) -> &'static [StepKind] {
        let pipeline: &'static [StepKind] = &Self::PIPELINE;
        let position = pipeline
            .iter()
            .position(|step| step == self)
            .map_or(Self::PIPELINE.len(), |i| i + 1);
        pipeline.get(position..).unwrap_or(&[])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Plan => "plan",
            StepKind::Research => "research",
            StepKind::Draft => "draft",
            StepKind::Format => "format",
            StepKind::Review => "review",
        }
    }

    /// Label with revision number for the repeated steps.
    pub fn with_revision(&self, retry_count: u32) -> String {
        if retry_count > 0 && Self::REVISION.contains(self) {
            format!("{} (revision #{})", self.as_str(), retry_count)
        } else {
            self.as_str().to_string()
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
