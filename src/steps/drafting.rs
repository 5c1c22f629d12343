use super::parse::parse_json_response;
use super::{require, Step};
use crate::domain::{FailureKind, SectionContent, StepFailure, StepKind};
use crate::service::{ContentService, ServiceRequest};
use crate::state::WorkflowState;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Tokens charged per section when the service does not report usage.
pub const DRAFTING_TOKENS_PER_SECTION: u64 = 2500;

const SYSTEM_PROMPT: &str = "You are a technical writer specializing in Standard Operating Procedures.\n\
Use active voice and imperative mood. Be specific with quantities, temperatures and times.\n\
Number all procedure steps. Mark safety warnings with \"⚠️ WARNING:\", critical notes with \
\"⚡ CRITICAL:\" and checkpoints with \"✓ CHECKPOINT:\". Include time estimates.\n\n\
Return ONLY valid JSON:\n\
{\"section_title\": \"Section Name\", \"content\": \"Detailed content with markdown formatting\", \
\"safety_warnings\": [\"Warning 1\"], \"quality_checkpoints\": [\"Checkpoint 1\"], \
\"time_estimate_minutes\": 30}";

#[derive(Debug, Deserialize)]
struct DraftedSection {
    content: String,
}

pub struct DraftingStep {
    service: Arc<dyn ContentService>,
    model: Option<String>,
    max_sections: usize,
}

impl DraftingStep {
    pub fn new(
        service: Arc<dyn ContentService>,
        model: Option<String>,
        max_sections: usize,
    ) -> Self {
        Self {
            service,
            model,
            max_sections,
        }
    }

    fn revision_notes(state: &WorkflowState) -> Option<String> {
        if state.retry_count == 0 {
            return None;
        }
        let review = state.review_result.as_ref()?;
        let mut notes = format!(
            "\n\nThis is revision #{}. The previous draft scored {:.1}/10.\nReviewer feedback: {}",
            state.retry_count, review.score, review.feedback
        );
        if !review.issues.is_empty() {
            notes.push_str("\nIssues to fix:");
            for issue in &review.issues {
                notes.push_str("\n- ");
                notes.push_str(issue);
            }
        }
        Some(notes)
    }
}

#[async_trait]
impl Step for DraftingStep {
    fn kind(&self) -> StepKind {
        StepKind::Draft
    }

    async fn execute(&self, mut state: WorkflowState) -> Result<WorkflowState, StepFailure> {
        let outline = require(&state.outline, "outline")?;
        let findings = require(&state.research_findings, "research_findings")?;

        let join_or_none = |items: &[String]| {
            if items.is_empty() {
                "None".to_string()
            } else {
                items.join(", ")
            }
        };
        let best_practices = join_or_none(&findings.best_practices);
        let compliance = join_or_none(&findings.compliance_requirements);
        let revision = Self::revision_notes(&state).unwrap_or_default();

        let mut content = SectionContent::new();
        let mut tokens = 0u64;
        let sections = outline.sections.iter().take(self.max_sections);
        for section in sections {
            let user_prompt = format!(
                "Write detailed SOP content for this section:\n\n\
                 Section: {} {}\n\
                 Topic context: {} ({})\n\
                 Target Audience: {}\n\
                 Best Practices: {}\n\
                 Compliance: {}{}",
                section.number,
                section.title,
                state.topic,
                state.industry,
                state.target_audience,
                best_practices,
                compliance,
                revision
            );
            let request =
                ServiceRequest::new(StepKind::Draft, SYSTEM_PROMPT.to_string(), user_prompt)
                    .with_model(self.model.clone());
            let response = self.service.generate(request).await?;
            let drafted: DraftedSection = parse_json_response(&response.text)?;
            if drafted.content.trim().is_empty() {
                return Err(StepFailure::new(
                    FailureKind::EmptyOutput,
                    format!("section {} came back without content", section.number),
                ));
            }
            tracing::debug!(
                section = %section.number,
                chars = drafted.content.len(),
                "section drafted"
            );
            content.insert(section.number.clone(), drafted.content);
            tokens += response.tokens_or(DRAFTING_TOKENS_PER_SECTION);
        }

        if content.is_empty() {
            return Err(StepFailure::precondition("outline.sections"));
        }

        tracing::info!(
            workflow_id = %state.workflow_id,
            sections = content.len(),
            revision = state.retry_count,
            "draft written"
        );
        state.section_content = content;
        state.add_tokens(tokens);
        state.status = StepKind::Draft.produces();
        Ok(state)
    }
}
