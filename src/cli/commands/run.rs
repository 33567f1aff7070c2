//! The `run` command: execute a WBS project.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output;
use crate::domain::models::{Config, ProgressEvent, ProgressPayload};
use crate::services::{Orchestrator, OrchestratorOptions};

/// Options resolved from CLI flags over loaded configuration.
pub struct RunArgs {
    pub wbs_path: PathBuf,
    pub workspace: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub max_concurrent: Option<usize>,
    pub dry_run: bool,
    pub fail_fast: bool,
    pub json: bool,
}

/// Execute a project. Returns `true` only when every task completed.
pub async fn handle_run(args: RunArgs, config: &Config) -> Result<bool> {
    let mut options = OrchestratorOptions::from_config(config);
    if let Some(workspace) = args.workspace {
        options.workspace_dir = workspace;
    }
    if let Some(state_file) = args.state_file {
        options.state_file = Some(state_file);
    }
    if let Some(max_concurrent) = args.max_concurrent {
        options.max_concurrent = max_concurrent;
    }
    options.dry_run = args.dry_run;
    options.fail_fast = args.fail_fast;

    let mut orchestrator = Orchestrator::new(&args.wbs_path, options)
        .with_context(|| format!("Failed to load WBS from {}", args.wbs_path.display()))?
        .with_progress_callback(progress_callback(args.json));

    let run_outcome = orchestrator.run().await;

    let summary = orchestrator.summary();
    if args.json {
        let report = serde_json::json!({
            "summary": summary,
            "failed_tasks": failed_tasks(&orchestrator),
            "versioned_files": orchestrator.versioned_files(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("{}", output::format_summary(&summary));
        for (task_id, error) in failed_tasks(&orchestrator) {
            println!("  {} {task_id}: {error}", style("✗").red());
        }
        if !orchestrator.versioned_files().is_empty() {
            println!(
                "{} conflicts were saved as versioned files:",
                style("warning:").yellow()
            );
            for file in orchestrator.versioned_files() {
                println!("  - {file}");
            }
        }
    }

    run_outcome.context("Orchestration aborted")?;
    Ok(summary.failed == 0 && summary.completed == summary.total)
}

fn failed_tasks(orchestrator: &Orchestrator) -> Vec<(String, String)> {
    orchestrator
        .results()
        .iter()
        .filter(|result| !result.success)
        .map(|result| {
            (
                result.task_id.clone(),
                result.error.clone().unwrap_or_default(),
            )
        })
        .collect()
}

/// Build the progress renderer: JSON events on stdout, or a progress bar
/// with styled per-task lines.
fn progress_callback(json: bool) -> Arc<dyn Fn(&ProgressEvent) + Send + Sync> {
    if json {
        return Arc::new(|event: &ProgressEvent| {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        });
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} tasks")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    Arc::new(move |event: &ProgressEvent| match &event.payload {
        ProgressPayload::ProjectStarted { summary } => {
            bar.set_length(summary.total as u64);
            bar.set_position((summary.completed + summary.failed) as u64);
        }
        ProgressPayload::TaskStarted { task_name, .. } => {
            bar.println(format!("{} {task_name}", style("▶").yellow()));
        }
        ProgressPayload::TaskCompleted { task_id } => {
            bar.println(format!("{} {task_id}", style("✓").green()));
        }
        ProgressPayload::TaskFailed { task_id, error } => {
            bar.println(format!("{} {task_id}: {error}", style("✗").red()));
        }
        ProgressPayload::ProgressUpdate { summary } => {
            bar.set_position((summary.completed + summary.failed) as u64);
        }
        ProgressPayload::ProjectCompleted { .. } => {
            bar.finish_and_clear();
        }
    })
}
