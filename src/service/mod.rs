//! Content generation backends consumed by the generation steps.
//!
//! A `ContentService` accepts one prompt and asynchronously returns text or
//! a classified `StepFailure`. The engine never talks to a service directly.

mod command;
mod offline;

pub use command::CommandService;
pub use offline::OfflineService;

use crate::domain::{StepFailure, StepKind};
use async_trait::async_trait;

/// Response length limit asked of the backend.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub step: StepKind,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Backend-specific model name; `None` lets the backend pick.
    pub model: Option<String>,
    pub max_tokens: u32,
}

impl ServiceRequest {
    pub fn new(step: StepKind, system_prompt: String, user_prompt: String) -> Self {
        Self {
            step,
            system_prompt,
            user_prompt,
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// System and user prompt joined for backends that take a single prompt.
    pub fn combined_prompt(&self) -> String {
        format!("{}\n\n{}", self.system_prompt, self.user_prompt)
    }
}

/// Raw text returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub text: String,
    /// Tokens reported by the backend, when it reports any.
    pub tokens_used: Option<u64>,
}

impl ServiceResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_used: None,
        }
    }

    /// Reported token usage, or `fallback` when the backend did not report it.
    pub fn tokens_or(&self, fallback: u64) -> u64 {
        self.tokens_used.unwrap_or(fallback)
    }
}

#[async_trait]
pub trait ContentService: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: ServiceRequest) -> Result<ServiceResponse, StepFailure>;
}
