use crate::domain::{
    ErrorRecord, Outline, ResearchFindings, ReviewResult, SectionContent, TimestampUtc,
    WorkflowError, WorkflowId,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Init,
    Planned,
    Researched,
    Drafted,
    Formatted,
    Reviewed,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Init => "init",
            WorkflowStatus::Planned => "planned",
            WorkflowStatus::Researched => "researched",
            WorkflowStatus::Drafted => "drafted",
            WorkflowStatus::Formatted => "formatted",
            WorkflowStatus::Reviewed => "reviewed",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// Edges of the status graph. `Reviewed -> Drafted` is the revision edge;
    /// every non-terminal status may fail.
    pub fn can_transition_to(&self, to: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, to),
            (Init, Planned)
                | (Planned, Researched)
                | (Researched, Drafted)
                | (Drafted, Formatted)
                | (Formatted, Reviewed)
                | (Reviewed, Completed)
                | (Reviewed, Drafted)
                | (_, Failed)
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The record threaded through every step of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub topic: String,
    pub industry: String,
    pub target_audience: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub outline: Option<Outline>,
    #[serde(default)]
    pub research_findings: Option<ResearchFindings>,
    #[serde(default)]
    pub section_content: SectionContent,
    #[serde(default)]
    pub formatted_document: Option<String>,
    #[serde(default)]
    pub review_result: Option<ReviewResult>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    #[serde(default)]
    pub started_at: Option<TimestampUtc>,
    #[serde(default)]
    pub completed_at: Option<TimestampUtc>,
}

impl WorkflowState {
    pub fn new(topic: &str, industry: &str, target_audience: &str) -> Self {
        Self {
            workflow_id: WorkflowId::new(),
            topic: topic.to_string(),
            industry: industry.to_string(),
            target_audience: target_audience.to_string(),
            requirements: Vec::new(),
            status: WorkflowStatus::Init,
            outline: None,
            research_findings: None,
            section_content: SectionContent::new(),
            formatted_document: None,
            review_result: None,
            retry_count: 0,
            tokens_used: 0,
            errors: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn transition(&mut self, to: WorkflowStatus) -> Result<(), WorkflowError> {
        if self.status.is_terminal() {
            return Err(WorkflowError::Terminal {
                status: self.status,
            });
        }
        if !self.status.can_transition_to(to) {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(TimestampUtc::now());
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_approved(&self) -> bool {
        self.review_result.as_ref().is_some_and(|r| r.approved)
    }

    /// Completed without an approving review: the retry ceiling forced the finish.
    pub fn is_forced_completion(&self) -> bool {
        self.status == WorkflowStatus::Completed && !self.is_approved()
    }

    pub fn add_tokens(&mut self, tokens: u64) {
        self.tokens_used = self.tokens_used.saturating_add(tokens);
    }

    pub fn review_score(&self) -> Option<f64> {
        self.review_result.as_ref().map(|r| r.score)
    }

    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .with_context(|| "Failed to serialize state to JSON")?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .with_context(|| format!("Failed to write temp state file: {}", temp_path.display()))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
