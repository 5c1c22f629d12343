use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sop")]
#[command(about = "Generates standard operating procedures through a plan/research/draft/format/review workflow")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SOP_WORKFLOW_GIT_SHA"), ")"))]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Workflow configuration (YAML). Defaults to the built-in configuration.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the workflow for one topic
    Generate(GenerateArgs),
    /// Print the effective configuration as YAML
    Config,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What the SOP is about (all arguments are joined)
    #[arg(trailing_var_arg = true, required = true)]
    pub topic: Vec<String>,

    /// Industry the procedure applies to
    #[arg(short, long)]
    pub industry: String,

    /// Who will follow the procedure
    #[arg(short, long, default_value = "General staff")]
    pub audience: String,

    /// Additional requirement (repeatable)
    #[arg(short = 'r', long = "requirement")]
    pub requirements: Vec<String>,

    /// Maximum revision passes; overrides the configuration
    #[arg(long)]
    pub retry_ceiling: Option<u32>,

    /// Use canned responses instead of the external service
    #[arg(long)]
    pub offline: bool,

    /// Number of reviews the offline service rejects before approving
    #[arg(long, default_value = "0", requires = "offline")]
    pub offline_rejections: u32,

    /// Directory under which the run directory is created
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the final state as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

impl GenerateArgs {
    pub fn topic(&self) -> String {
        self.topic.join(" ")
    }
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
