//! The `status` command: report task states from a WBS and saved state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::output;
use crate::domain::models::PersistedState;
use crate::services::TaskGraphEngine;

/// Print a task table (or JSON report) for the WBS, with any persisted
/// lifecycle state applied.
pub fn handle_status(
    wbs_path: &Path,
    state_file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut graph = TaskGraphEngine::from_path(wbs_path)
        .with_context(|| format!("Failed to load WBS from {}", wbs_path.display()))?;

    if let Some(path) = state_file {
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read state file {}", path.display()))?;
            let state: PersistedState = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse state file {}", path.display()))?;
            for (task_id, status) in state.task_status {
                if graph.task(&task_id).is_some() {
                    graph.update(&task_id, status)?;
                }
            }
        }
    }

    if json {
        let tasks: Vec<serde_json::Value> = graph
            .tasks()
            .map(|task| {
                serde_json::json!({
                    "id": task.id,
                    "name": task.name,
                    "phase": task.phase_id,
                    "status": task.status,
                })
            })
            .collect();
        let report = serde_json::json!({
            "summary": graph.summary(),
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", output::status_table(graph.tasks()));
        println!("{}", output::format_summary(&graph.summary()));
    }

    Ok(())
}
