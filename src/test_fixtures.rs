//! Shared builders for unit tests.

use crate::domain::{
    Outline, ResearchFindings, ReviewResult, SectionOutline, SimilarSop, StepFailure,
};
use crate::service::{ContentService, ServiceRequest, ServiceResponse};
use crate::state::WorkflowState;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn outline(sections: usize) -> Outline {
    Outline {
        title: "SOP: Tank cleaning".to_string(),
        industry: "Food".to_string(),
        sections: (1..=sections)
            .map(|i| SectionOutline {
                number: i.to_string(),
                title: format!("Section {}", i),
                subsections: vec![format!("{}.1 Detail", i)],
            })
            .collect(),
        estimated_pages: 6,
    }
}

pub fn findings() -> ResearchFindings {
    ResearchFindings {
        similar_sops: vec![SimilarSop {
            title: "CIP cleaning".to_string(),
            relevance: 0.9,
            key_points: vec!["Drain first".to_string()],
        }],
        compliance_requirements: vec!["FSMA".to_string()],
        best_practices: vec!["Lockout pumps".to_string()],
        sources: vec!["kb".to_string()],
    }
}

pub fn review(approved: bool, score: f64) -> ReviewResult {
    ReviewResult {
        score,
        feedback: if approved {
            "Ready".to_string()
        } else {
            "Add acceptance criteria".to_string()
        },
        issues: if approved {
            vec![]
        } else {
            vec!["No acceptance criteria".to_string()]
        },
        approved,
        completeness_score: score,
        clarity_score: score,
        compliance_score: score,
    }
}

pub fn new_state() -> WorkflowState {
    WorkflowState::new("Tank cleaning", "Food", "Sanitation crew")
}

/// Returns queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedService {
    responses: Mutex<VecDeque<Result<ServiceResponse, StepFailure>>>,
    requests: Mutex<Vec<ServiceRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(self, value: serde_json::Value) -> Self {
        self.respond(Ok(ServiceResponse::text(value.to_string())))
    }

    pub fn respond(self, response: Result<ServiceResponse, StepFailure>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: ServiceRequest) -> Result<ServiceResponse, StepFailure> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StepFailure::parse("script exhausted")))
    }
}
