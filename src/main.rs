mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, GenerateArgs};
use sop_workflow::config::WorkflowConfig;
use sop_workflow::engine::{CancelHandle, ChannelObserver, WorkflowEngine, WorkflowRequest};
use sop_workflow::paths;
use sop_workflow::service::{CommandService, ContentService, OfflineService};
use sop_workflow::state::{WorkflowState, WorkflowStatus};
use sop_workflow::steps::StepSet;
use sop_workflow::structured_logger::StructuredLogger;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sop_workflow=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = WorkflowConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_yaml()?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Generate(args) => generate(args, config).await,
    }
}

async fn generate(args: GenerateArgs, mut config: WorkflowConfig) -> Result<ExitCode> {
    if let Some(retry_ceiling) = args.retry_ceiling {
        config.retry_ceiling = retry_ceiling;
    }

    let service: Arc<dyn ContentService> = if args.offline {
        Arc::new(OfflineService::new(args.offline_rejections))
    } else {
        Arc::new(CommandService::new(&config.service))
    };
    tracing::info!(service = service.name(), "Using content service");

    let request = WorkflowRequest::new(args.topic(), &args.industry, &args.audience)
        .with_requirements(args.requirements.clone())
        .with_retry_ceiling(config.retry_ceiling);
    let run_dir = paths::run_dir(args.output.as_deref(), &request.workflow_id)?;
    let logger = Arc::new(
        StructuredLogger::new(&run_dir)
            .with_context(|| format!("Failed to open event log in {}", run_dir.display()))?,
    );

    let (observer, mut progress) = ChannelObserver::new();
    let engine = WorkflowEngine::new(StepSet::with_service(service, &config))
        .with_logger(logger)
        .with_observer(Arc::new(observer));

    let show_progress = !args.json;
    let progress_task = tokio::spawn(async move {
        while let Some(snapshot) = progress.recv().await {
            if show_progress {
                eprintln!(
                    "[sop] {:<10} retries={} tokens={}",
                    snapshot.status.as_str(),
                    snapshot.retry_count,
                    snapshot.tokens_used
                );
            }
        }
    });

    let (cancel, token) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("[sop] Interrupt received; stopping after the current step");
            cancel.cancel();
        }
    });

    let state = engine.run(request, token).await;
    drop(engine);
    let _ = progress_task.await;

    write_outputs(&state, &run_dir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_summary(&state, &run_dir);
    }

    Ok(match state.status {
        WorkflowStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn write_outputs(state: &WorkflowState, run_dir: &Path) -> Result<()> {
    state.save_atomic(&paths::state_path(run_dir))?;
    if let Some(document) = &state.formatted_document {
        let path = paths::document_path(run_dir);
        std::fs::write(&path, document)
            .with_context(|| format!("Failed to write document: {}", path.display()))?;
    }
    Ok(())
}

fn print_summary(state: &WorkflowState, run_dir: &Path) {
    println!("Workflow {}", state.workflow_id);
    println!("  Status:   {}", state.status);
    if state.is_forced_completion() {
        println!("  Review:   not approved (revision limit reached)");
    }
    if let Some(score) = state.review_score() {
        println!("  Score:    {:.1}/10", score);
    }
    println!("  Retries:  {}", state.retry_count);
    println!("  Tokens:   {}", state.tokens_used);
    for error in &state.errors {
        println!("  Error:    {}", error);
    }
    println!("  Output:   {}", run_dir.display());
}
