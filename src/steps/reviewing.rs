use super::parse::parse_json_response;
use super::{require, Step};
use crate::domain::{ReviewResult, StepFailure, StepKind};
use crate::service::{ContentService, ServiceRequest};
use crate::state::WorkflowState;
use async_trait::async_trait;
use std::sync::Arc;

pub const REVIEW_TOKENS: u64 = 1500;

/// Characters of the document shown to the reviewer.
pub const REVIEW_SAMPLE_CHARS: usize = 3000;

pub struct ReviewStep {
    service: Arc<dyn ContentService>,
    model: Option<String>,
    approval_threshold: f64,
}

impl ReviewStep {
    pub fn new(
        service: Arc<dyn ContentService>,
        model: Option<String>,
        approval_threshold: f64,
    ) -> Self {
        Self {
            service,
            model,
            approval_threshold,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a quality assurance specialist for Standard Operating Procedures.\n\
             Score completeness, clarity and compliance from 0 to 10. \
             Overall score is the average.\n\
             approved = true if overall score >= {:.1}, else false.\n\n\
             Return ONLY valid JSON:\n\
             {{\"score\": 8.5, \"feedback\": \"Detailed feedback\", \"approved\": true, \
             \"issues\": [\"Issue 1\"], \"completeness_score\": 9.0, \"clarity_score\": 8.5, \
             \"compliance_score\": 8.5}}",
            self.approval_threshold
        )
    }

    /// Applies the local gate: the reviewer's approval only counts at or above the threshold.
    pub fn gate(&self, mut review: ReviewResult) -> ReviewResult {
        review.approved = review.approved && review.score >= self.approval_threshold;
        review
    }
}

/// First `REVIEW_SAMPLE_CHARS` characters of the document, marked when cut.
pub fn document_sample(document: &str) -> String {
    if document.chars().count() > REVIEW_SAMPLE_CHARS {
        let mut sample: String = document.chars().take(REVIEW_SAMPLE_CHARS).collect();
        sample.push_str("...");
        sample
    } else {
        document.to_string()
    }
}

#[async_trait]
impl Step for ReviewStep {
    fn kind(&self) -> StepKind {
        StepKind::Review
    }

    async fn execute(&self, mut state: WorkflowState) -> Result<WorkflowState, StepFailure> {
        let document = require(&state.formatted_document, "formatted_document")?;
        let user_prompt = format!(
            "Review this SOP document:\n\n\
             Topic: {}\n\
             Industry: {}\n\n\
             Document:\n{}\n\n\
             Return complete JSON.",
            state.topic,
            state.industry,
            document_sample(document)
        );
        let request = ServiceRequest::new(StepKind::Review, self.system_prompt(), user_prompt)
            .with_model(self.model.clone());

        let response = self.service.generate(request).await?;
        let review: ReviewResult = parse_json_response(&response.text)?;
        review.validate().map_err(StepFailure::parse)?;
        let review = self.gate(review);

        tracing::info!(
            workflow_id = %state.workflow_id,
            score = review.score,
            approved = review.approved,
            revision = state.retry_count,
            "document reviewed"
        );
        state.review_result = Some(review);
        state.add_tokens(response.tokens_or(REVIEW_TOKENS));
        state.status = StepKind::Review.produces();
        Ok(state)
    }
}
