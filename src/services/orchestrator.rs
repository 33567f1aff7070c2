//! Orchestrator - the central coordinator driving a project to completion.
//!
//! The run loop asks the graph engine for the runnable frontier, executes
//! each frontier batch concurrently through the task runner, integrates
//! successful results into the shared workspace, persists lifecycle state
//! after every change, and reports progress through a callback.
//!
//! Ordering is strict across batches: a batch is fully integrated before
//! the next frontier is queried. Within a batch there is no ordering;
//! every sandbox is seeded from the shared tree as of the batch start.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Config, ExecutionResult, PersistedState, ProgressCallback, ProgressEvent, ProgressPayload,
    ProgressSummary, TaskSpec, TaskStatus,
};
use crate::services::merge_resolver::MergeResolver;
use crate::services::task_graph::TaskGraphEngine;
use crate::services::task_runner::TaskRunner;
use crate::services::workspace::WorkspaceService;

/// Construction options for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Workspace root (shared tree, sandboxes, registry).
    pub workspace_dir: PathBuf,
    /// Execution-state file; none disables persistence and resume.
    pub state_file: Option<PathBuf>,
    /// Concurrency cap for agent subprocesses.
    pub max_concurrent: usize,
    /// Skip subprocess invocation and simulate work.
    pub dry_run: bool,
    /// Abort the run on the first task failure.
    pub fail_fast: bool,
    /// Agent executable.
    pub agent_path: String,
    /// Wall-clock timeout per task.
    pub task_timeout: Duration,
    /// Wall-clock timeout per merge sub-agent.
    pub merge_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("./workspace"),
            state_file: None,
            max_concurrent: 3,
            dry_run: false,
            fail_fast: false,
            agent_path: "claude".to_string(),
            task_timeout: Duration::from_secs(3600),
            merge_timeout: Duration::from_secs(300),
        }
    }
}

impl OrchestratorOptions {
    /// Derive options from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            workspace_dir: config.workspace.root.clone(),
            state_file: config.workspace.state_file.clone(),
            max_concurrent: config.max_concurrent,
            agent_path: config.agent.binary_path.clone(),
            task_timeout: Duration::from_secs(config.agent.timeout_secs),
            merge_timeout: Duration::from_secs(config.agent.merge_timeout_secs),
            ..Self::default()
        }
    }
}

/// Drives a WBS project end to end.
pub struct Orchestrator {
    graph: TaskGraphEngine,
    runner: TaskRunner,
    workspace: Arc<WorkspaceService>,
    resolver: MergeResolver,
    options: OrchestratorOptions,
    progress_callback: Option<ProgressCallback>,
    results: Vec<ExecutionResult>,
    versioned_files: Vec<String>,
    /// Dry-run hook: this task id reports a simulated failure.
    simulate_failure: Option<String>,
    /// Test hook: stop the loop once this many results were collected.
    max_results: Option<usize>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .field("progress_callback", &self.progress_callback.is_some())
            .field("results", &self.results)
            .field("versioned_files", &self.versioned_files)
            .field("simulate_failure", &self.simulate_failure)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Load the WBS and build the component stack.
    pub fn new(wbs_path: impl AsRef<Path>, options: OrchestratorOptions) -> DomainResult<Self> {
        let graph = TaskGraphEngine::from_path(wbs_path.as_ref())?;
        fs::create_dir_all(&options.workspace_dir)?;

        let registry_path = options.workspace_dir.join("artifact_registry.json");
        let workspace = Arc::new(WorkspaceService::new(
            &options.workspace_dir,
            Some(registry_path),
        )?);
        let runner = TaskRunner::new(
            &options.agent_path,
            options.max_concurrent,
            options.task_timeout,
        );
        let resolver = MergeResolver::new(
            &options.workspace_dir,
            &options.agent_path,
            options.merge_timeout,
            options.max_concurrent,
        )?;

        Ok(Self {
            graph,
            runner,
            workspace,
            resolver,
            options,
            progress_callback: None,
            results: Vec::new(),
            versioned_files: Vec::new(),
            simulate_failure: None,
            max_results: None,
        })
    }

    /// Subscribe a progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Dry-run hook marking one task as a simulated failure.
    pub fn simulate_failure(&mut self, task_id: impl Into<String>) {
        self.simulate_failure = Some(task_id.into());
    }

    /// Test hook bounding how many tasks a run may execute.
    pub fn limit_tasks(&mut self, max_results: usize) {
        self.max_results = Some(max_results);
    }

    /// Current per-status counts.
    pub fn summary(&self) -> ProgressSummary {
        self.graph.summary()
    }

    /// The graph engine (read access for status reporting and tests).
    pub fn graph(&self) -> &TaskGraphEngine {
        &self.graph
    }

    /// Results collected so far, in execution order.
    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    /// Files that ended up as versioned sidecars during final collection.
    pub fn versioned_files(&self) -> &[String] {
        &self.versioned_files
    }

    fn emit(&self, payload: ProgressPayload) {
        if let Some(ref callback) = self.progress_callback {
            callback(&ProgressEvent::now(payload));
        }
    }

    // ------------------------------------------------------------------
    // State persistence
    // ------------------------------------------------------------------

    fn load_state(&mut self) -> DomainResult<()> {
        let Some(path) = self.options.state_file.clone() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let raw = fs::read_to_string(&path)?;
        let state: PersistedState = serde_json::from_str(&raw)?;
        for (task_id, status) in state.task_status {
            if self.graph.task(&task_id).is_some() {
                self.graph.update(&task_id, status)?;
            }
        }
        info!(path = %path.display(), "state loaded");
        Ok(())
    }

    fn save_state(&self) -> DomainResult<()> {
        let Some(ref path) = self.options.state_file else {
            return Ok(());
        };
        let state = PersistedState::now(
            self.graph
                .tasks()
                .map(|task| (task.id.clone(), task.status))
                .collect(),
        );
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = path.with_extension("tmp");
        fs::write(&temp, serde_json::to_string_pretty(&state)?)?;
        fs::rename(&temp, path)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------

    /// Execute the project until quiescence. Returns every execution
    /// result, in batch order.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> DomainResult<Vec<ExecutionResult>> {
        info!(workspace = %self.options.workspace_dir.display(), "starting orchestration");

        self.load_state()?;
        self.emit(ProgressPayload::ProjectStarted {
            summary: self.graph.summary(),
        });

        while !self.graph.done() {
            if let Some(limit) = self.max_results {
                if self.results.len() >= limit {
                    break;
                }
            }

            let batch: Vec<TaskSpec> = self
                .graph
                .runnable()
                .into_iter()
                .map(|task| TaskSpec::new(task.id.clone(), task.name.clone(), task.prompt_text()))
                .collect();

            if batch.is_empty() {
                let failed = self.graph.summary().failed;
                if failed > 0 {
                    let message = format!("Cannot proceed: {failed} tasks failed");
                    error!(%message, "run blocked by failed tasks");
                    if self.options.fail_fast {
                        self.save_state()?;
                        return Err(DomainError::ExecutionFailed(message));
                    }
                }
                break;
            }

            for spec in &batch {
                self.emit(ProgressPayload::TaskStarted {
                    task_id: spec.id.clone(),
                    task_name: spec.name.clone(),
                });
                self.graph.update(&spec.id, TaskStatus::InProgress)?;
            }
            self.save_state()?;

            let batch_results = if self.options.dry_run {
                self.dry_run_batch(&batch).await
            } else {
                self.runner
                    .execute_batch(&batch, Some(&self.workspace))
                    .await
            };

            let mut batch_failed = false;
            for result in batch_results {
                if result.success {
                    self.graph.update(&result.task_id, TaskStatus::Completed)?;
                    self.emit(ProgressPayload::TaskCompleted {
                        task_id: result.task_id.clone(),
                    });
                    if !self.options.dry_run {
                        self.integrate_result(&result).await?;
                    }
                } else {
                    batch_failed = true;
                    self.graph.update(&result.task_id, TaskStatus::Failed)?;
                    self.emit(ProgressPayload::TaskFailed {
                        task_id: result.task_id.clone(),
                        error: result.error.clone().unwrap_or_default(),
                    });
                }
                self.save_state()?;
                self.results.push(result);
            }

            self.emit(ProgressPayload::ProgressUpdate {
                summary: self.graph.summary(),
            });

            if batch_failed && self.options.fail_fast {
                let failed_ids: Vec<String> = self
                    .results
                    .iter()
                    .filter(|result| !result.success)
                    .map(|result| result.task_id.clone())
                    .collect();
                return Err(DomainError::ExecutionFailed(format!(
                    "Task failed: {}",
                    failed_ids.join(", ")
                )));
            }
        }

        self.save_state()?;

        let summary = self.graph.summary();
        self.emit(ProgressPayload::ProjectCompleted { summary });
        info!(
            completed = summary.completed,
            total = summary.total,
            "orchestration completed"
        );

        if summary.completed > 0 {
            self.collect_artifacts().await?;
        }

        Ok(self.results.clone())
    }

    /// Integrate one successful result into the shared workspace and
    /// record its artifacts in the registry.
    async fn integrate_result(&self, result: &ExecutionResult) -> DomainResult<()> {
        let Some(ref sandbox) = result.workspace else {
            return Ok(());
        };
        let report = self
            .workspace
            .integrate(&result.task_id, sandbox, Some(&self.resolver))
            .await?;
        info!(
            task_id = %result.task_id,
            new = report.new,
            modified = report.modified,
            conflict = report.conflict,
            "integrated task results"
        );

        let task_name = self
            .graph
            .task(&result.task_id)
            .map(|task| task.name.clone())
            .unwrap_or_default();
        self.workspace
            .register_task_artifacts(&result.task_id, &task_name, sandbox)?;
        Ok(())
    }

    /// Simulate a batch without touching subprocesses or the workspace.
    async fn dry_run_batch(&self, batch: &[TaskSpec]) -> Vec<ExecutionResult> {
        futures::future::join_all(batch.iter().map(|spec| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.simulate_failure.as_deref() == Some(spec.id.as_str()) {
                ExecutionResult::failure(spec.id.clone(), "Simulated error", 0.1)
            } else {
                ExecutionResult {
                    task_id: spec.id.clone(),
                    success: true,
                    stdout: format!("Dry run: {} completed", spec.name),
                    stderr: String::new(),
                    error: None,
                    artifacts: Vec::new(),
                    execution_secs: 0.1,
                    workspace: None,
                    timestamp: Utc::now(),
                }
            }
        }))
        .await
    }

    // ------------------------------------------------------------------
    // Final artifact collection
    // ------------------------------------------------------------------

    /// Copy every produced artifact into `<workspace>/integrated/` through
    /// the single-file integrate path, then write a README summarizing the
    /// files and versioned conflicts.
    async fn collect_artifacts(&mut self) -> DomainResult<()> {
        let integrated_dir = self.options.workspace_dir.join("integrated");
        fs::create_dir_all(&integrated_dir)?;
        info!("starting artifact collection");

        let mut copied: Vec<String> = Vec::new();
        let mut versioned: Vec<String> = Vec::new();

        for result in &self.results {
            if !result.success || result.artifacts.is_empty() {
                continue;
            }
            let Some(ref task_dir) = result.workspace else {
                continue;
            };

            for artifact in &result.artifacts {
                if is_agent_config(artifact) {
                    continue;
                }
                let source = task_dir.join(artifact);
                if !source.exists() {
                    continue;
                }

                let actual = self
                    .workspace
                    .integrate_artifact(&source, &integrated_dir, &result.task_id, Some(&self.resolver))
                    .await?;

                let source_name = source
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let actual_name = actual
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if actual_name != source_name {
                    versioned.push(format!("{source_name} -> {actual_name}"));
                }
                copied.push(actual_name);
            }
        }

        if copied.is_empty() {
            warn!("no artifacts found to collect");
            return Ok(());
        }

        info!(files = copied.len(), dir = %integrated_dir.display(), "artifact collection completed");
        if !versioned.is_empty() {
            warn!(conflicts = ?versioned, "file conflicts resolved by versioning");
        }

        let mut readme = String::from(
            "# Integrated Project Artifacts\n\n\
             This directory contains all artifacts generated by the project run.\n\n\
             ## Generated Files:\n",
        );
        let unique: BTreeSet<&String> = copied.iter().collect();
        for filename in unique {
            readme.push_str(&format!("- {filename}\n"));
        }
        if !versioned.is_empty() {
            readme.push_str("\n## File Conflicts (Versioned):\n");
            for conflict in &versioned {
                readme.push_str(&format!("- {conflict}\n"));
            }
        }
        readme.push_str(&format!(
            "\n## Generation Date: {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));
        fs::write(integrated_dir.join("README.md"), readme)?;

        self.versioned_files = versioned;
        Ok(())
    }
}

/// Whether an artifact path lives under the agent configuration directory.
fn is_agent_config(path: &str) -> bool {
    Path::new(path)
        .components()
        .next()
        .is_some_and(|component| component.as_os_str() == ".claude")
}
