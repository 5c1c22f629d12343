//! Home-based storage paths for workflow runs.
//!
//! Runs live under `~/.sop-workflow/runs/<workflow-id>/`, each holding the
//! final state, the rendered document and the JSONL event log.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::WorkflowId;

const SOP_WORKFLOW_DIR: &str = ".sop-workflow";

/// Returns `~/.sop-workflow/`, creating it if needed.
pub fn sop_workflow_home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory for run storage")?;
    ensure_dir(home.join(SOP_WORKFLOW_DIR), "workflow")
}

/// Returns the output directory for one run.
///
/// With `base` set the directory is `<base>/<workflow-id>/`, otherwise
/// `~/.sop-workflow/runs/<workflow-id>/`. Created if needed.
pub fn run_dir(base: Option<&Path>, workflow_id: &WorkflowId) -> Result<PathBuf> {
    let root = match base {
        Some(base) => base.to_path_buf(),
        None => sop_workflow_home_dir()?.join("runs"),
    };
    ensure_dir(root.join(workflow_id.to_string()), "run")
}

/// `<run_dir>/state.json`
pub fn state_path(run_dir: &Path) -> PathBuf {
    run_dir.join("state.json")
}

/// `<run_dir>/document.md`
pub fn document_path(run_dir: &Path) -> PathBuf {
    run_dir.join("document.md")
}

fn ensure_dir(dir: PathBuf, what: &str) -> Result<PathBuf> {
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {} directory: {}", what, dir.display()))?;
    Ok(dir)
}

#[cfg(test)]
#[path = "tests/paths_tests.rs"]
mod tests;
