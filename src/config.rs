use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_RETRY_CEILING: u32 = 2;

const DEFAULT_WORKFLOW_YAML: &str = include_str!("../workflow.yaml");

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f64,
    #[serde(default = "default_max_sections")]
    pub max_sections: usize,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub models: ModelConfig,
}

/// External generation command.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Per-step model names. `None` leaves the choice to the service.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub planning: Option<String>,
    #[serde(default)]
    pub research: Option<String>,
    #[serde(default)]
    pub drafting: Option<String>,
    #[serde(default)]
    pub review: Option<String>,
}

fn default_retry_ceiling() -> u32 {
    DEFAULT_RETRY_CEILING
}

fn default_approval_threshold() -> f64 {
    8.0
}

fn default_max_sections() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec![
                "-p".to_string(),
                "--output-format".to_string(),
                "text".to_string(),
            ],
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retry_ceiling: default_retry_ceiling(),
            approval_threshold: default_approval_threshold(),
            max_sections: default_max_sections(),
            service: ServiceConfig::default(),
            models: ModelConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration embedded in the binary from `workflow.yaml`.
    pub fn default_config() -> Result<Self> {
        serde_yaml::from_str(DEFAULT_WORKFLOW_YAML)
            .context("Failed to parse embedded workflow.yaml")
    }

    /// Loads `path` (or the embedded defaults), applies environment overrides and validates.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default_config()?,
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `SOP_RETRY_CEILING` and `SOP_MODEL_*` when set and non-empty.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_value("SOP_RETRY_CEILING") {
            self.retry_ceiling = value.parse().with_context(|| {
                format!(
                    "SOP_RETRY_CEILING must be a non-negative integer, got '{}'",
                    value
                )
            })?;
        }
        let models = [
            ("SOP_MODEL_PLANNING", &mut self.models.planning),
            ("SOP_MODEL_RESEARCH", &mut self.models.research),
            ("SOP_MODEL_DRAFTING", &mut self.models.drafting),
            ("SOP_MODEL_REVIEW", &mut self.models.review),
        ];
        for (var, slot) in models {
            if let Some(value) = env_value(var) {
                *slot = Some(value);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=10.0).contains(&self.approval_threshold) {
            anyhow::bail!(
                "approval_threshold must be between 0 and 10, got {}",
                self.approval_threshold
            );
        }
        if self.max_sections == 0 {
            anyhow::bail!("max_sections must be at least 1");
        }
        if self.service.command.trim().is_empty() {
            anyhow::bail!("service.command must not be empty");
        }
        if self.service.timeout_secs == 0 {
            anyhow::bail!("service.timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
