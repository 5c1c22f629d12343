use super::*;
use crate::domain::{FailureKind, ReviewResult};

#[test]
fn test_strip_json_fence() {
    assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
}

#[test]
fn test_strip_bare_fence() {
    assert_eq!(strip_code_fence("  ```\n{\"a\": 1}\n```  "), "{\"a\": 1}");
}

#[test]
fn test_unfenced_text_is_trimmed() {
    assert_eq!(strip_code_fence("\n {\"a\": 1} \n"), "{\"a\": 1}");
}

#[test]
fn test_parse_review_in_fence() {
    let text = r#"```json
{"score": 8.5, "feedback": "good", "approved": true}
```"#;
    let review: ReviewResult = parse_json_response(text).unwrap();
    assert!(review.approved);
    assert_eq!(review.score, 8.5);
    assert!(review.issues.is_empty());
}

#[test]
fn test_parse_object_wrapped_in_prose() {
    let text = "Here is the review:\n{\"score\": 6.0, \"feedback\": \"thin\", \"approved\": false}\nThanks.";
    let review: ReviewResult = parse_json_response(text).unwrap();
    assert!(!review.approved);
}

#[test]
fn test_parse_failure_kind() {
    let err = parse_json_response::<ReviewResult>("not json at all").unwrap_err();
    assert!(matches!(err.kind, FailureKind::ParseFailure(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_parse_empty_response() {
    let err = parse_json_response::<ReviewResult>("```json\n```").unwrap_err();
    assert!(matches!(err.kind, FailureKind::ParseFailure(_)));
}

#[test]
fn test_patterns_compile_once() {
    let first = code_fence().expect("fence pattern compiles");
    assert!(std::ptr::eq(first, code_fence().unwrap()));
    let object = embedded_object().expect("object pattern compiles");
    assert!(std::ptr::eq(object, embedded_object().unwrap()));
}
