use super::{require, Step};
use crate::domain::{StepFailure, StepKind};
use crate::state::WorkflowState;
use async_trait::async_trait;
use chrono::Utc;

/// Renders the drafted sections into one markdown document.
///
/// Pure: no service call and no token charge.
#[derive(Debug, Default)]
pub struct FormattingStep;

impl FormattingStep {
    pub fn new() -> Self {
        Self
    }

    pub fn render(state: &WorkflowState) -> Result<String, StepFailure> {
        let outline = require(&state.outline, "outline")?;
        if state.section_content.is_empty() {
            return Err(StepFailure::precondition("section_content"));
        }

        let today = Utc::now();
        let mut doc = Vec::new();
        doc.push(format!("# {}", outline.title));
        doc.push(String::new());
        doc.push("**Document Control**".to_string());
        doc.push(format!(
            "- Document ID: SOP-{}-{}",
            today.format("%Y%m%d"),
            state.workflow_id.short()
        ));
        doc.push("- Version: 1.0".to_string());
        doc.push(format!("- Effective Date: {}", today.format("%Y-%m-%d")));
        doc.push(format!("- Industry: {}", state.industry));
        doc.push(format!("- Target Audience: {}", state.target_audience));
        doc.push(String::new());
        doc.push("---".to_string());
        doc.push(String::new());
        doc.push("## Table of Contents".to_string());
        doc.push(String::new());

        // Outline order wins; drafted sections missing from the outline go last.
        let mut ordered: Vec<(String, &str)> = outline
            .sections
            .iter()
            .filter_map(|s| {
                state
                    .section_content
                    .get(&s.number)
                    .map(|text| (format!("{}. {}", s.number, s.title), text))
            })
            .collect();
        for (id, text) in state.section_content.iter() {
            if outline.section(id).is_none() {
                ordered.push((id.to_string(), text));
            }
        }

        for (i, (heading, _)) in ordered.iter().enumerate() {
            doc.push(format!("{}. {}", i + 1, heading));
        }
        doc.push(String::new());
        doc.push("---".to_string());
        doc.push(String::new());

        for (heading, text) in &ordered {
            doc.push(format!("## {}", heading));
            doc.push(String::new());
            doc.push(text.trim().to_string());
            doc.push(String::new());
            doc.push("---".to_string());
            doc.push(String::new());
        }

        doc.push("**Approval Signatures**".to_string());
        doc.push(String::new());
        for role in ["Prepared", "Reviewed", "Approved"] {
            doc.push(format!("{} by: _________________ Date: _______", role));
            doc.push(String::new());
        }

        Ok(doc.join("\n").trim_end().to_string())
    }
}

#[async_trait]
impl Step for FormattingStep {
    fn kind(&self) -> StepKind {
        StepKind::Format
    }

    async fn execute(&self, mut state: WorkflowState) -> Result<WorkflowState, StepFailure> {
        let document = Self::render(&state)?;
        tracing::info!(
            workflow_id = %state.workflow_id,
            chars = document.len(),
            "document formatted"
        );
        state.formatted_document = Some(document);
        state.status = StepKind::Format.produces();
        Ok(state)
    }
}
