use super::*;
use crate::domain::{Outline, ReviewResult};
use crate::steps::parse::parse_json_response;

fn request(step: StepKind, user_prompt: &str) -> ServiceRequest {
    ServiceRequest::new(step, String::new(), user_prompt.to_string())
}

#[tokio::test]
async fn test_plan_uses_topic_from_prompt() {
    let service = OfflineService::new(0);
    let response = service
        .generate(request(StepKind::Plan, "Create an outline\nTopic: Forklift charging\n"))
        .await
        .unwrap();
    let outline: Outline = parse_json_response(&response.text).unwrap();
    assert_eq!(outline.title, "SOP: Forklift charging");
    assert_eq!(outline.sections.len(), MANDATORY_SECTIONS.len());
    assert!(outline.validate().is_ok());
}

#[tokio::test]
async fn test_review_rejects_then_approves() {
    let service = OfflineService::new(2);
    let mut approvals = Vec::new();
    for _ in 0..3 {
        let response = service.generate(request(StepKind::Review, "")).await.unwrap();
        let review: ReviewResult = parse_json_response(&response.text).unwrap();
        approvals.push(review.approved);
    }
    assert_eq!(approvals, vec![false, false, true]);
}

#[tokio::test]
async fn test_format_is_not_served() {
    let service = OfflineService::new(0);
    assert!(service.generate(request(StepKind::Format, "")).await.is_err());
}
