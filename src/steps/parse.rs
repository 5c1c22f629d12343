//! JSON extraction from service responses.

use crate::domain::StepFailure;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

fn code_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```$").ok())
        .as_ref()
}

fn embedded_object() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").ok()).as_ref()
}

/// Returns the body of a markdown code fence when the whole response is
/// wrapped in one, otherwise the trimmed response.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let fenced = code_fence()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1));
    match fenced {
        Some(body) => body.as_str().trim(),
        None => trimmed,
    }
}

/// Parses a JSON object out of a service response.
///
/// Falls back to the outermost `{...}` span when the model wrapped the
/// object in prose.
pub fn parse_json_response<T: DeserializeOwned>(text: &str) -> Result<T, StepFailure> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(StepFailure::parse("response is empty"));
    }
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let embedded = embedded_object()
                .and_then(|re| re.find(body))
                .map(|m| m.as_str());
            match embedded {
                Some(object) if object.len() < body.len() => serde_json::from_str(object)
                    .map_err(|e| StepFailure::parse(e.to_string())),
                _ => Err(StepFailure::parse(first_err.to_string())),
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/parse_tests.rs"]
mod tests;
