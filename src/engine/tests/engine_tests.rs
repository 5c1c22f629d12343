//! Tests for the workflow driver loop.

use super::*;
use crate::config::WorkflowConfig;
use crate::domain::{ErrorKind, FailureKind, SectionContent, StepFailure};
use crate::service::OfflineService;
use crate::state::WorkflowStatus;
use crate::steps::Step;
use crate::test_fixtures::{findings, outline, review};
use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

enum Behavior {
    Succeed,
    Fail(StepFailure),
    /// Claims a status the step cannot produce.
    WrongStatus,
    /// Requests cancellation while running, then succeeds.
    Cancel(CancelHandle),
}

/// In-memory step that writes a plausible artifact for its slot.
struct FakeStep {
    kind: StepKind,
    behavior: Behavior,
    approvals: Mutex<VecDeque<bool>>,
    approve_when_exhausted: bool,
    calls: AtomicU32,
}

impl FakeStep {
    fn new(kind: StepKind, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behavior,
            approvals: Mutex::new(VecDeque::new()),
            approve_when_exhausted: false,
            calls: AtomicU32::new(0),
        })
    }

    fn ok(kind: StepKind) -> Arc<Self> {
        Self::new(kind, Behavior::Succeed)
    }

    /// Reviewer returning `approvals` in order, then `fallback` forever.
    fn reviewer(approvals: &[bool], fallback: bool) -> Arc<Self> {
        Arc::new(Self {
            kind: StepKind::Review,
            behavior: Behavior::Succeed,
            approvals: Mutex::new(approvals.iter().copied().collect()),
            approve_when_exhausted: fallback,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Step for FakeStep {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, mut state: WorkflowState) -> Result<WorkflowState, StepFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail(failure) => return Err(failure.clone()),
            Behavior::WrongStatus => {
                state.status = WorkflowStatus::Completed;
                return Ok(state);
            }
            Behavior::Cancel(handle) => handle.cancel(),
        }

        match self.kind {
            StepKind::Plan => state.outline = Some(outline(5)),
            StepKind::Research => state.research_findings = Some(findings()),
            StepKind::Draft => {
                let mut content = SectionContent::new();
                content.insert("1", format!("draft pass {}", state.retry_count));
                state.section_content = content;
            }
            StepKind::Format => {
                state.formatted_document = Some(format!("# Doc pass {}", state.retry_count));
            }
            StepKind::Review => {
                let approved = self
                    .approvals
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(self.approve_when_exhausted);
                let score = if approved { 8.5 } else { 6.0 };
                state.review_result = Some(review(approved, score));
            }
        }
        state.add_tokens(100);
        state.status = self.kind.produces();
        Ok(state)
    }
}

struct Pipeline {
    plan: Arc<FakeStep>,
    research: Arc<FakeStep>,
    draft: Arc<FakeStep>,
    format: Arc<FakeStep>,
    review: Arc<FakeStep>,
}

impl Pipeline {
    fn with_reviews(approvals: &[bool]) -> Self {
        Self {
            plan: FakeStep::ok(StepKind::Plan),
            research: FakeStep::ok(StepKind::Research),
            draft: FakeStep::ok(StepKind::Draft),
            format: FakeStep::ok(StepKind::Format),
            review: FakeStep::reviewer(approvals, false),
        }
    }

    fn replace(mut self, step: Arc<FakeStep>) -> Self {
        match step.kind {
            StepKind::Plan => self.plan = step,
            StepKind::Research => self.research = step,
            StepKind::Draft => self.draft = step,
            StepKind::Format => self.format = step,
            StepKind::Review => self.review = step,
        }
        self
    }

    fn engine(&self) -> WorkflowEngine {
        WorkflowEngine::new(StepSet::new(
            self.plan.clone(),
            self.research.clone(),
            self.draft.clone(),
            self.format.clone(),
            self.review.clone(),
        ))
    }
}

fn request(retry_ceiling: u32) -> WorkflowRequest {
    WorkflowRequest::new("Tank cleaning", "Food", "Sanitation crew")
        .with_retry_ceiling(retry_ceiling)
}

fn observed_statuses(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<StateSnapshot>,
) -> Vec<WorkflowStatus> {
    let mut statuses = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        statuses.push(snapshot.status);
    }
    statuses
}

#[tokio::test]
async fn test_first_review_approves() {
    let pipeline = Pipeline::with_reviews(&[true]);

    let state = pipeline.engine().run(request(2), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.retry_count, 0);
    assert!(state.errors.is_empty());
    assert!(state.is_approved());
    assert!(!state.is_forced_completion());
    assert_eq!(state.review_score(), Some(8.5));
    assert_eq!(state.tokens_used, 500);
    assert!(state.started_at.is_some());
    assert!(state.completed_at.is_some());
    for step in [
        &pipeline.plan,
        &pipeline.research,
        &pipeline.draft,
        &pipeline.format,
        &pipeline.review,
    ] {
        assert_eq!(step.calls(), 1);
    }
}

#[tokio::test]
async fn test_one_revision_then_approval() {
    let pipeline = Pipeline::with_reviews(&[false, true]);

    let state = pipeline.engine().run(request(2), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.retry_count, 1);
    assert!(state.is_approved());
    assert_eq!(pipeline.plan.calls(), 1, "plan output is reused");
    assert_eq!(pipeline.research.calls(), 1, "research output is reused");
    for step in StepKind::REVISION {
        let fake = match step {
            StepKind::Draft => &pipeline.draft,
            StepKind::Format => &pipeline.format,
            _ => &pipeline.review,
        };
        assert_eq!(fake.calls(), 2, "{} runs once per pass", step);
    }
    assert_eq!(state.section_content.get("1"), Some("draft pass 1"));
}

#[tokio::test]
async fn test_ceiling_forces_finish() {
    let pipeline = Pipeline::with_reviews(&[]);

    let state = pipeline.engine().run(request(2), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.retry_count, 2);
    assert_eq!(pipeline.draft.calls(), 3);
    assert_eq!(pipeline.review.calls(), 3);
    let review = state.review_result.as_ref().unwrap();
    assert!(!review.approved);
    assert!(state.is_forced_completion());
    assert!(state.errors.is_empty(), "a forced finish is not an error");
    assert!(state.formatted_document.is_some());
}

#[tokio::test]
async fn test_research_failure_is_contained() {
    let pipeline = Pipeline::with_reviews(&[true]).replace(FakeStep::new(
        StepKind::Research,
        Behavior::Fail(StepFailure::new(FailureKind::Network, "upstream unavailable")),
    ));

    let state = pipeline.engine().run(request(2), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Failed);
    assert_eq!(state.errors.len(), 1);
    let error = &state.errors[0];
    assert_eq!(error.kind, ErrorKind::StepExecutionFailure);
    assert_eq!(error.step, Some(StepKind::Research));
    assert!(error.message.contains("upstream unavailable"));
    assert!(error.retryable);

    assert!(state.outline.is_some());
    assert!(state.research_findings.is_none());
    assert!(state.section_content.is_empty());
    assert!(state.formatted_document.is_none());
    assert!(state.review_result.is_none());
    assert_eq!(pipeline.draft.calls(), 0);
    assert!(state.completed_at.is_some());
}

#[tokio::test]
async fn test_plan_failure_stops_before_research() {
    let pipeline = Pipeline::with_reviews(&[true]).replace(FakeStep::new(
        StepKind::Plan,
        Behavior::Fail(StepFailure::parse("not JSON")),
    ));

    let state = pipeline.engine().run(request(2), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Failed);
    assert_eq!(state.errors.len(), 1);
    assert!(state.outline.is_none());
    assert_eq!(pipeline.research.calls(), 0);
}

#[tokio::test]
async fn test_timeout_failure_propagates_like_any_other() {
    let pipeline = Pipeline::with_reviews(&[true]).replace(FakeStep::new(
        StepKind::Format,
        Behavior::Fail(StepFailure::timeout("service timed out after 300s")),
    ));

    let state = pipeline.engine().run(request(2), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Failed);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].failure, Some(FailureKind::Timeout));
    assert!(state.errors[0].retryable);
    assert_eq!(pipeline.format.calls(), 1, "technical failures are never retried");
    assert!(!state.section_content.is_empty());
    assert!(state.formatted_document.is_none());
    assert_eq!(pipeline.review.calls(), 0);
}

#[tokio::test]
async fn test_zero_ceiling_finishes_after_first_rejection() {
    let pipeline = Pipeline::with_reviews(&[false]);

    let state = pipeline.engine().run(request(0), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.retry_count, 0);
    assert_eq!(pipeline.review.calls(), 1);
    assert!(state.is_forced_completion());
}

#[tokio::test]
async fn test_cancel_before_start_fails_without_running_steps() {
    let pipeline = Pipeline::with_reviews(&[true]);
    let (handle, token) = CancelHandle::new();
    handle.cancel();

    let state = pipeline.engine().run(request(2), token).await;

    assert_eq!(state.status, WorkflowStatus::Failed);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].kind, ErrorKind::CancelledByCaller);
    assert_eq!(state.errors[0].step, Some(StepKind::Plan));
    assert_eq!(pipeline.plan.calls(), 0);
}

#[tokio::test]
async fn test_cancel_mid_run_lets_current_step_finish() {
    let (handle, token) = CancelHandle::new();
    let pipeline = Pipeline::with_reviews(&[true])
        .replace(FakeStep::new(StepKind::Research, Behavior::Cancel(handle)));

    let state = pipeline.engine().run(request(2), token).await;

    assert_eq!(state.status, WorkflowStatus::Failed);
    assert!(state.research_findings.is_some(), "in-flight step is applied");
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].kind, ErrorKind::CancelledByCaller);
    assert_eq!(state.errors[0].step, Some(StepKind::Draft));
    assert_eq!(pipeline.draft.calls(), 0);
}

#[tokio::test]
async fn test_wrong_status_is_a_contract_violation() {
    let pipeline = Pipeline::with_reviews(&[true])
        .replace(FakeStep::new(StepKind::Draft, Behavior::WrongStatus));

    let state = pipeline.engine().run(request(2), CancelToken::never()).await;

    assert_eq!(state.status, WorkflowStatus::Failed);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].kind, ErrorKind::ContractViolation);
    assert_eq!(state.errors[0].step, Some(StepKind::Draft));
    assert!(!state.errors[0].retryable);
    assert_eq!(pipeline.format.calls(), 0);
}

#[tokio::test]
async fn test_observer_sees_every_transition_in_order() {
    let pipeline = Pipeline::with_reviews(&[false, true]);
    let (observer, mut rx) = ChannelObserver::new();
    let engine = pipeline.engine().with_observer(Arc::new(observer));

    engine.run(request(2), CancelToken::never()).await;

    use WorkflowStatus::*;
    assert_eq!(
        observed_statuses(&mut rx),
        vec![
            Init, Planned, Researched, Drafted, Formatted, Reviewed, Drafted, Formatted, Reviewed,
            Completed
        ]
    );
}

#[tokio::test]
async fn test_observed_walks_are_valid() {
    let runs = [
        Pipeline::with_reviews(&[]),
        Pipeline::with_reviews(&[true]),
        Pipeline::with_reviews(&[true]).replace(FakeStep::new(
            StepKind::Review,
            Behavior::Fail(StepFailure::new(FailureKind::EmptyOutput, "no output")),
        )),
    ];

    for pipeline in runs {
        let (observer, mut rx) = ChannelObserver::new();
        let engine = pipeline.engine().with_observer(Arc::new(observer));
        let state = engine.run(request(2), CancelToken::never()).await;

        let walk = observed_statuses(&mut rx);
        assert_eq!(walk.first(), Some(&WorkflowStatus::Init));
        assert_eq!(walk.last(), Some(&state.status));
        assert!(state.status.is_terminal());
        for pair in walk.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "invalid edge {} -> {}",
                pair[0],
                pair[1]
            );
        }
    }
}

#[tokio::test]
async fn test_snapshots_carry_increasing_sequence() {
    let pipeline = Pipeline::with_reviews(&[true]);
    let (observer, mut rx) = ChannelObserver::new();
    let engine = pipeline.engine().with_observer(Arc::new(observer));

    let state = engine.run(request(2), CancelToken::never()).await;

    let mut snapshots = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        snapshots.push(snapshot);
    }
    assert!(snapshots.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(snapshots.iter().all(|s| s.workflow_id == state.workflow_id));
    let last = snapshots.last().unwrap();
    assert_eq!(last.tokens_used, state.tokens_used);
    assert_eq!(last.state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn test_offline_service_runs_the_real_steps() {
    let config = WorkflowConfig::default();
    // (review rejections, expected retries, expected approval)
    let cases = [(0, 0, true), (1, 1, true), (5, 2, false)];

    for (rejections, retries, approved) in cases {
        let service = Arc::new(OfflineService::new(rejections));
        let (observer, mut rx) = ChannelObserver::new();
        let engine = WorkflowEngine::new(StepSet::with_service(service, &config))
            .with_observer(Arc::new(observer));

        let state = engine.run(request(2), CancelToken::never()).await;

        assert_eq!(state.status, WorkflowStatus::Completed, "{} rejections", rejections);
        assert!(state.errors.is_empty(), "{:?}", state.errors);
        assert_eq!(state.retry_count, retries);
        assert_eq!(state.is_approved(), approved);
        assert_eq!(state.is_forced_completion(), !approved);
        assert_eq!(state.section_content.len(), config.max_sections);
        assert!(state.tokens_used > 0);
        let document = state.formatted_document.as_deref().unwrap();
        let outline = state.outline.as_ref().unwrap();
        assert!(document.starts_with(&format!("# {}", outline.title)));

        use WorkflowStatus::*;
        let mut expected = vec![Init, Planned, Researched];
        for _ in 0..=retries {
            expected.extend([Drafted, Formatted, Reviewed]);
        }
        expected.push(Completed);
        assert_eq!(observed_statuses(&mut rx), expected);
    }
}

#[tokio::test]
async fn test_parallel_runs_are_independent() {
    let pipeline = Pipeline::with_reviews(&[]).replace(FakeStep::reviewer(&[], true));
    let engine = pipeline.engine();

    let first = request(2).with_requirements(vec!["HACCP".to_string()]);
    let second = WorkflowRequest::new("Forklift charging", "Logistics", "Operators");
    let (first_id, second_id) = (first.workflow_id, second.workflow_id);

    let (a, b) = tokio::join!(
        engine.run(first, CancelToken::never()),
        engine.run(second, CancelToken::never())
    );

    assert_ne!(a.workflow_id, b.workflow_id);
    assert_eq!(a.workflow_id, first_id);
    assert_eq!(b.workflow_id, second_id);
    assert_eq!(a.requirements, vec!["HACCP".to_string()]);
    assert_eq!(b.topic, "Forklift charging");
    assert_eq!(a.status, WorkflowStatus::Completed);
    assert_eq!(b.status, WorkflowStatus::Completed);
    assert_eq!(a.tokens_used, 500);
    assert_eq!(b.tokens_used, 500);
}

#[tokio::test]
async fn test_run_is_recorded_in_structured_log() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Arc::new(StructuredLogger::new(temp_dir.path()).unwrap());
    let pipeline = Pipeline::with_reviews(&[true]);
    let engine = pipeline.engine().with_logger(logger);

    let state = engine.run(request(2), CancelToken::never()).await;

    let log = std::fs::read_to_string(temp_dir.path().join("events.jsonl")).unwrap();
    let entries: Vec<serde_json::Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let invoked = entries
        .iter()
        .filter(|e| e["event"]["type"] == "StepInvoked")
        .count();
    assert_eq!(invoked, 5);
    let last = entries.last().unwrap();
    assert_eq!(last["event"]["type"], "RunComplete");
    assert_eq!(last["event"]["status"], "completed");
    assert_eq!(last["workflow_id"], state.workflow_id.to_string());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_retry_count_never_exceeds_ceiling(
        retry_ceiling in 0u32..5,
        approvals in proptest::collection::vec(any::<bool>(), 0..8),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let pipeline = Pipeline::with_reviews(&approvals);
        let state = runtime.block_on(
            pipeline.engine().run(request(retry_ceiling), CancelToken::never()),
        );

        prop_assert_eq!(state.status, WorkflowStatus::Completed);
        prop_assert!(state.retry_count <= retry_ceiling);
        prop_assert_eq!(pipeline.review.calls(), state.retry_count + 1);
        prop_assert_eq!(pipeline.draft.calls(), state.retry_count + 1);
    }
}
