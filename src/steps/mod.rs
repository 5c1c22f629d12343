//! Step units: the five pluggable pieces of work a run sequences.
//!
//! Every step takes the current `WorkflowState` by value and returns either
//! the next state or a `StepFailure`. The engine keeps its own copy of the
//! input, so a failing step can never leave a half-applied state behind.

mod drafting;
mod formatting;
pub mod parse;
mod planning;
mod research;
mod reviewing;

pub use drafting::DraftingStep;
pub use formatting::FormattingStep;
pub use planning::{PlanningStep, MANDATORY_SECTIONS};
pub use research::ResearchStep;
pub use reviewing::ReviewStep;

use crate::config::WorkflowConfig;
use crate::domain::{StepFailure, StepKind};
use crate::service::ContentService;
use crate::state::WorkflowState;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Step: Send + Sync {
    /// The slot this step fills; its `produces()` status is the post-condition.
    fn kind(&self) -> StepKind;

    async fn execute(&self, state: WorkflowState) -> Result<WorkflowState, StepFailure>;
}

/// The fixed set of five steps a run is driven with.
///
/// Read-only after construction; one set can back any number of parallel runs.
#[derive(Clone)]
pub struct StepSet {
    plan: Arc<dyn Step>,
    research: Arc<dyn Step>,
    draft: Arc<dyn Step>,
    format: Arc<dyn Step>,
    review: Arc<dyn Step>,
}

impl StepSet {
    pub fn new(
        plan: Arc<dyn Step>,
        research: Arc<dyn Step>,
        draft: Arc<dyn Step>,
        format: Arc<dyn Step>,
        review: Arc<dyn Step>,
    ) -> Self {
        Self {
            plan,
            research,
            draft,
            format,
            review,
        }
    }

    /// Builds the standard generation steps on top of one content service.
    pub fn with_service(service: Arc<dyn ContentService>, config: &WorkflowConfig) -> Self {
        Self::new(
            Arc::new(PlanningStep::new(
                service.clone(),
                config.models.planning.clone(),
            )),
            Arc::new(ResearchStep::new(
                service.clone(),
                config.models.research.clone(),
            )),
            Arc::new(DraftingStep::new(
                service.clone(),
                config.models.drafting.clone(),
                config.max_sections,
            )),
            Arc::new(FormattingStep::new()),
            Arc::new(ReviewStep::new(
                service,
                config.models.review.clone(),
                config.approval_threshold,
            )),
        )
    }

    pub fn get(&self, kind: StepKind) -> &Arc<dyn Step> {
        match kind {
            StepKind::Plan => &self.plan,
            StepKind::Research => &self.research,
            StepKind::Draft => &self.draft,
            StepKind::Format => &self.format,
            StepKind::Review => &self.review,
        }
    }
}

impl std::fmt::Debug for StepSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSet")
            .field("plan", &self.plan.kind())
            .field("research", &self.research.kind())
            .field("draft", &self.draft.kind())
            .field("format", &self.format.kind())
            .field("review", &self.review.kind())
            .finish()
    }
}

fn require<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, StepFailure> {
    value.as_ref().ok_or_else(|| StepFailure::precondition(field))
}

#[cfg(test)]
#[path = "tests/steps_tests.rs"]
mod tests;
