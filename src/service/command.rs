//! Content service backed by an external CLI process.

use super::{ContentService, ServiceRequest, ServiceResponse};
use crate::config::ServiceConfig;
use crate::domain::failure::NETWORK_ERROR_PATTERN;
use crate::domain::{FailureKind, StepFailure};
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Spawns the configured command once per request, writes the prompt to its
/// stdin and treats stdout as the response text.
#[derive(Debug, Clone)]
pub struct CommandService {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandService {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, request: &ServiceRequest) -> Command {
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        if let Some(model) = &request.model {
            command.arg("--model").arg(model);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ContentService for CommandService {
    fn name(&self) -> &str {
        &self.command
    }

    async fn generate(&self, request: ServiceRequest) -> Result<ServiceResponse, StepFailure> {
        let mut child = self.build_command(&request).spawn().map_err(|e| {
            StepFailure::new(
                FailureKind::Unknown(e.to_string()),
                format!("failed to spawn `{}`: {}", self.command, e),
            )
        })?;

        // Feed stdin concurrently so a chatty child cannot block on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.combined_prompt();
            let step = request.step;
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    tracing::debug!(%step, "prompt write to service stdin failed: {}", e);
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(StepFailure::new(
                    FailureKind::Unknown(e.to_string()),
                    format!("failed to wait for `{}`: {}", self.command, e),
                ))
            }
            Err(_) => {
                return Err(StepFailure::timeout(format!(
                    "`{}` did not answer within {:?}",
                    self.command, self.timeout
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = classify_output(output.status.code(), &stdout, &stderr)?;
        tracing::debug!(
            step = %request.step,
            bytes = text.len(),
            "service `{}` answered",
            self.command
        );
        Ok(ServiceResponse::text(text))
    }
}

/// Maps a finished process to its response text or a classified failure.
///
/// A `None` exit code means the process was killed by a signal.
pub fn classify_output(
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Result<String, StepFailure> {
    match exit_code {
        Some(0) => {}
        code => {
            let code = code.unwrap_or(-1);
            let detail = stderr.trim();
            let kind = if is_network_error(stderr) {
                FailureKind::Network
            } else {
                FailureKind::ProcessExit(code)
            };
            return Err(StepFailure::new(
                kind,
                format!("service exited with code {}: {}", code, detail),
            ));
        }
    }

    if stdout.trim().is_empty() {
        return Err(StepFailure::new(
            FailureKind::EmptyOutput,
            "service produced no output",
        ));
    }
    Ok(stdout.trim().to_string())
}

/// Checks if stderr contains network error patterns.
pub fn is_network_error(stderr: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    match RE.get_or_init(|| Regex::new(NETWORK_ERROR_PATTERN).ok()) {
        Some(re) => re.is_match(stderr),
        None => {
            let lower = stderr.to_lowercase();
            lower.contains("connect") || lower.contains("network") || lower.contains("dns")
        }
    }
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
