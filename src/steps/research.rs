use super::parse::parse_json_response;
use super::{require, Step};
use crate::domain::{ResearchFindings, StepFailure, StepKind};
use crate::service::{ContentService, ServiceRequest};
use crate::state::WorkflowState;
use async_trait::async_trait;
use std::sync::Arc;

pub const RESEARCH_TOKENS: u64 = 1500;

const SYSTEM_PROMPT: &str = "You are a research specialist for SOP development. \
Find and synthesize relevant information from existing SOPs, regulations and best practices.\n\n\
Return ONLY valid JSON:\n\
{\"similar_sops\": [{\"title\": \"SOP Title\", \"relevance\": 0.95, \"key_points\": [\"Point 1\"]}], \
\"compliance_requirements\": [\"Regulation 1\"], \"best_practices\": [\"Best practice 1\"], \
\"sources\": [\"Source 1\"]}\n\n\
Always cite sources and flag conflicting requirements.";

pub struct ResearchStep {
    service: Arc<dyn ContentService>,
    model: Option<String>,
}

impl ResearchStep {
    pub fn new(service: Arc<dyn ContentService>, model: Option<String>) -> Self {
        Self { service, model }
    }
}

#[async_trait]
impl Step for ResearchStep {
    fn kind(&self) -> StepKind {
        StepKind::Research
    }

    async fn execute(&self, mut state: WorkflowState) -> Result<WorkflowState, StepFailure> {
        let outline = require(&state.outline, "outline")?;
        let section_titles = outline
            .sections
            .iter()
            .map(|s| s.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let user_prompt = format!(
            "Research information for this SOP:\n\
             Topic: {}\n\
             Industry: {}\n\
             Sections: {}\n\n\
             Find similar procedures, compliance requirements and best practices.",
            state.topic, state.industry, section_titles
        );
        let request =
            ServiceRequest::new(StepKind::Research, SYSTEM_PROMPT.to_string(), user_prompt)
                .with_model(self.model.clone());

        let response = self.service.generate(request).await?;
        let findings: ResearchFindings = parse_json_response(&response.text)?;

        tracing::info!(
            workflow_id = %state.workflow_id,
            similar = findings.similar_sops.len(),
            compliance = findings.compliance_requirements.len(),
            "research gathered"
        );
        state.research_findings = Some(findings);
        state.add_tokens(response.tokens_or(RESEARCH_TOKENS));
        state.status = StepKind::Research.produces();
        Ok(state)
    }
}
