//! Verification of the state a step hands back.

use crate::domain::{StepKind, WorkflowError};
use crate::state::WorkflowState;

/// Checks `after` against `before` for the given step.
///
/// A step may write only the artifact it owns; every other artifact,
/// earlier or later in the pipeline, must come back unchanged.
///
/// Returns the first broken rule as `WorkflowError::ContractViolation`.
pub fn verify_step_output(
    step: StepKind,
    before: &WorkflowState,
    after: &WorkflowState,
) -> Result<(), WorkflowError> {
    let violation = |message: String| WorkflowError::ContractViolation { step, message };

    let expected = step.produces();
    if after.status != expected {
        return Err(violation(format!(
            "expected status {}, step returned {}",
            expected, after.status
        )));
    }
    if !before.status.can_transition_to(after.status) {
        return Err(violation(format!(
            "{} -> {} is not a valid transition",
            before.status, after.status
        )));
    }

    if after.workflow_id != before.workflow_id {
        return Err(violation("workflow_id was changed".to_string()));
    }
    if after.topic != before.topic
        || after.industry != before.industry
        || after.target_audience != before.target_audience
        || after.requirements != before.requirements
    {
        return Err(violation("input parameters were changed".to_string()));
    }
    if after.retry_count != before.retry_count {
        return Err(violation(format!(
            "retry_count changed from {} to {}",
            before.retry_count, after.retry_count
        )));
    }
    if after.tokens_used < before.tokens_used {
        return Err(violation(format!(
            "tokens_used decreased from {} to {}",
            before.tokens_used, after.tokens_used
        )));
    }
    if after.errors.get(..before.errors.len()) != Some(before.errors.as_slice()) {
        return Err(violation("recorded errors were rewritten".to_string()));
    }

    if let Some(other) = StepKind::PIPELINE
        .iter()
        .find(|&&other| other != step && artifact_changed(other, before, after))
    {
        let position = if step.downstream().contains(other) {
            "later"
        } else {
            "earlier"
        };
        return Err(violation(format!(
            "{} belongs to the {} {} step and was changed",
            artifact_name(*other),
            position,
            other
        )));
    }

    let missing = match step {
        StepKind::Plan => after.outline.is_none(),
        StepKind::Research => after.research_findings.is_none(),
        StepKind::Draft => after.section_content.is_empty(),
        StepKind::Format => after
            .formatted_document
            .as_deref()
            .unwrap_or("")
            .trim()
            .is_empty(),
        StepKind::Review => after.review_result.is_none(),
    };
    if missing {
        return Err(violation(format!(
            "{} was not populated",
            artifact_name(step)
        )));
    }

    Ok(())
}

/// Name of the state field a step owns.
fn artifact_name(step: StepKind) -> &'static str {
    match step {
        StepKind::Plan => "outline",
        StepKind::Research => "research_findings",
        StepKind::Draft => "section_content",
        StepKind::Format => "formatted_document",
        StepKind::Review => "review_result",
    }
}

fn artifact_changed(step: StepKind, before: &WorkflowState, after: &WorkflowState) -> bool {
    match step {
        StepKind::Plan => before.outline != after.outline,
        StepKind::Research => before.research_findings != after.research_findings,
        StepKind::Draft => before.section_content != after.section_content,
        StepKind::Format => before.formatted_document != after.formatted_document,
        StepKind::Review => before.review_result != after.review_result,
    }
}
