use super::parse::parse_json_response;
use super::Step;
use crate::domain::{Outline, StepFailure, StepKind};
use crate::service::{ContentService, ServiceRequest};
use crate::state::WorkflowState;
use async_trait::async_trait;
use std::sync::Arc;

/// Tokens charged when the service does not report usage.
pub const PLANNING_TOKENS: u64 = 1500;

/// Sections every outline is asked to contain, in order.
pub const MANDATORY_SECTIONS: [&str; 11] = [
    "Purpose and Scope",
    "Definitions and Abbreviations",
    "Responsibilities and Authorities",
    "Required Materials and Equipment",
    "Safety Requirements and PPE",
    "Detailed Step-by-Step Procedures",
    "Quality Control and Verification",
    "Emergency Procedures",
    "Troubleshooting Guide",
    "References and Related Documents",
    "Revision History",
];

pub struct PlanningStep {
    service: Arc<dyn ContentService>,
    model: Option<String>,
}

impl PlanningStep {
    pub fn new(service: Arc<dyn ContentService>, model: Option<String>) -> Self {
        Self { service, model }
    }

    fn system_prompt() -> String {
        let sections = MANDATORY_SECTIONS
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are an expert SOP planning agent with deep knowledge of industrial processes, \
             safety protocols and documentation standards.\n\n\
             MANDATORY SECTIONS (in order):\n{}\n\n\
             Return ONLY valid JSON with this structure:\n\
             {{\"title\": \"Complete SOP Title\", \"industry\": \"Industry Name\", \
             \"sections\": [{{\"number\": \"1\", \"title\": \"Purpose and Scope\", \
             \"subsections\": [\"1.1 Purpose\", \"1.2 Scope\"]}}], \"estimated_pages\": 8}}\n\n\
             Use hierarchical numbering and place safety sections before procedures.",
            sections
        )
    }

    fn user_prompt(state: &WorkflowState) -> String {
        let requirements = if state.requirements.is_empty() {
            "None".to_string()
        } else {
            state.requirements.join(", ")
        };
        format!(
            "Create a detailed SOP outline for:\n\
             Topic: {}\n\
             Industry: {}\n\
             Target Audience: {}\n\
             Additional Requirements: {}",
            state.topic, state.industry, state.target_audience, requirements
        )
    }
}

#[async_trait]
impl Step for PlanningStep {
    fn kind(&self) -> StepKind {
        StepKind::Plan
    }

    async fn execute(&self, mut state: WorkflowState) -> Result<WorkflowState, StepFailure> {
        let request = ServiceRequest::new(
            StepKind::Plan,
            Self::system_prompt(),
            Self::user_prompt(&state),
        )
        .with_model(self.model.clone());

        let response = self.service.generate(request).await?;
        let outline: Outline = parse_json_response(&response.text)?;
        outline.validate().map_err(StepFailure::parse)?;

        tracing::info!(
            workflow_id = %state.workflow_id,
            sections = outline.sections.len(),
            "outline planned"
        );
        state.outline = Some(outline);
        state.add_tokens(response.tokens_or(PLANNING_TOKENS));
        state.status = StepKind::Plan.produces();
        Ok(state)
    }
}
