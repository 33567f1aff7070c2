//! Task runner.
//!
//! Drives the external agent subprocess: provisions a sandbox through the
//! workspace engine, invokes `<agent> --print <prompt>` with the sandbox as
//! working directory, enforces a wall-clock timeout, and collects the
//! produced artifacts. A counting semaphore caps concurrent invocations.
//!
//! Failures are always captured into [`ExecutionResult`]s; `execute` never
//! returns an error to the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutionResult, TaskSpec};
use crate::services::workspace::WorkspaceService;

/// Semaphore-gated executor for agent subprocesses.
pub struct TaskRunner {
    agent_path: String,
    timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl TaskRunner {
    /// Create a runner with its own concurrency limit.
    pub fn new(agent_path: impl Into<String>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            agent_path: agent_path.into(),
            timeout,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Execute one task. Every failure mode is captured into the returned
    /// result; this method never fails.
    pub async fn execute(
        &self,
        spec: &TaskSpec,
        workspace: Option<&WorkspaceService>,
    ) -> ExecutionResult {
        let permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(error) => {
                return ExecutionResult::failure(spec.id.clone(), error.to_string(), 0.0);
            }
        };
        let started = Instant::now();

        let result = match self.run_agent(spec, workspace, started).await {
            Ok(result) => result,
            Err(error) => {
                error!(task_id = %spec.id, %error, "task failed with error");
                ExecutionResult::failure(
                    spec.id.clone(),
                    error.to_string(),
                    started.elapsed().as_secs_f64(),
                )
            }
        };
        drop(permit);
        result
    }

    async fn run_agent(
        &self,
        spec: &TaskSpec,
        workspace: Option<&WorkspaceService>,
        started: Instant,
    ) -> DomainResult<ExecutionResult> {
        let workspace = workspace
            .ok_or_else(|| DomainError::ExecutionFailed("ArtifactManager required".to_string()))?;
        let sandbox = workspace.prepare_sandbox(&spec.id)?;

        let mut command = Command::new(&self.agent_path);
        command.arg("--print").arg(&spec.prompt);
        for file in &spec.context_files {
            command.arg("-f").arg(file);
        }
        command
            .current_dir(&sandbox)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(task_id = %spec.id, name = %spec.name, "executing task");
        debug!(task_id = %spec.id, command = ?command, "agent command");

        let mut child = command.spawn().map_err(|error| {
            DomainError::ExecutionFailed(format!("Failed to spawn agent: {error}"))
        })?;

        let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
            DomainError::ExecutionFailed("Failed to get stdout handle".to_string())
        })?;
        let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
            DomainError::ExecutionFailed("Failed to get stderr handle".to_string())
        })?;

        let awaited = timeout(self.timeout, async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let (out_read, err_read) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout),
                stderr_pipe.read_to_end(&mut stderr),
            );
            out_read?;
            err_read?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((stdout, stderr, status))
        })
        .await;

        let (stdout, stderr, status) = match awaited {
            Ok(inner) => inner?,
            Err(_) => {
                // Wall clock exceeded: kill the subprocess and reap it
                // before reporting the failure.
                let _ = child.kill().await;
                let timeout_secs = self.timeout.as_secs();
                warn!(task_id = %spec.id, timeout_secs, "task timed out");
                let mut result = ExecutionResult::failure(
                    spec.id.clone(),
                    format!("Task timeout after {timeout_secs}s"),
                    started.elapsed().as_secs_f64(),
                );
                result.workspace = Some(sandbox);
                return Ok(result);
            }
        };

        let execution_secs = started.elapsed().as_secs_f64();
        let mut result = ExecutionResult {
            task_id: spec.id.clone(),
            success: status.success(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            error: None,
            artifacts: collect_artifacts(&sandbox),
            execution_secs,
            workspace: Some(sandbox.clone()),
            timestamp: Utc::now(),
        };

        if !status.success() {
            let code = status
                .code()
                .map_or_else(|| "unknown".to_string(), |code| code.to_string());
            result.error = Some(format!("Process exited with code {code}"));
            error!(
                task_id = %spec.id,
                exit_code = %code,
                stderr = %result.stderr,
                "agent exited with non-zero status"
            );
            return Ok(result);
        }

        info!(task_id = %spec.id, execution_secs, "task completed successfully");

        // Preserve the agent's stdout for diagnostics, then refresh the
        // artifact list to include it.
        fs::write(sandbox.join("claude_output.txt"), &result.stdout)?;
        result.artifacts = collect_artifacts(&sandbox);

        if !result.artifacts.iter().any(|path| is_real_artifact(path)) {
            info!(task_id = %spec.id, "no files created by agent, attempting code block salvage");
            match salvage_code_blocks(&result.stdout, &sandbox) {
                Ok(0) => warn!(task_id = %spec.id, "no files could be salvaged from agent output"),
                Ok(count) => {
                    info!(task_id = %spec.id, count, "salvaged files from agent output");
                    result.artifacts = collect_artifacts(&sandbox);
                }
                Err(error) => warn!(task_id = %spec.id, %error, "code block salvage failed"),
            }
        }

        Ok(result)
    }

    /// Execute a batch concurrently. Each failure stays in its own result.
    pub async fn execute_batch(
        &self,
        specs: &[TaskSpec],
        workspace: Option<&WorkspaceService>,
    ) -> Vec<ExecutionResult> {
        info!(count = specs.len(), "starting batch execution");
        let results =
            futures::future::join_all(specs.iter().map(|spec| self.execute(spec, workspace)))
                .await;
        let succeeded = results.iter().filter(|result| result.success).count();
        info!(succeeded, total = specs.len(), "batch execution completed");
        results
    }
}

/// Sandbox-relative paths of every file under the sandbox, sorted.
fn collect_artifacts(sandbox: &Path) -> Vec<String> {
    let mut artifacts = Vec::new();
    collect_files(sandbox, sandbox, &mut artifacts);
    artifacts.sort();
    artifacts
}

fn collect_files(directory: &Path, root: &Path, artifacts: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(directory) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, root, artifacts);
        } else if path.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                artifacts.push(relative.to_string_lossy().into_owned());
            }
        }
    }
}

/// Whether an artifact path is agent output rather than runner metadata.
fn is_real_artifact(path: &str) -> bool {
    let first = Path::new(path)
        .components()
        .next()
        .map(|component| component.as_os_str().to_string_lossy().into_owned());
    first.as_deref() != Some(".claude") && path != "claude_output.txt"
}

/// Best-effort salvage of fenced code blocks from agent stdout.
///
/// Only blocks whose fence line names a file (```python app.py or
/// ```app.py) are written; anonymous blocks are ignored. Returns the
/// number of files written.
fn salvage_code_blocks(stdout: &str, sandbox: &Path) -> std::io::Result<usize> {
    let mut written = 0;
    let mut lines = stdout.lines();

    while let Some(line) = lines.next() {
        let Some(fence_rest) = line.trim_start().strip_prefix("```") else {
            continue;
        };
        let filename = fence_filename(fence_rest);

        let mut body = String::new();
        for block_line in lines.by_ref() {
            if block_line.trim_start().starts_with("```") {
                break;
            }
            body.push_str(block_line);
            body.push('\n');
        }

        let Some(filename) = filename else { continue };
        if let Some(target) = sanitize_relative(&filename) {
            let destination = sandbox.join(&target);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&destination, body.trim_end().as_bytes())?;
            info!(file = %target.display(), "salvaged file from output");
            written += 1;
        }
    }

    Ok(written)
}

/// Extract a filename token from the text after the opening fence: the
/// first whitespace-separated token that looks like `name.ext`.
fn fence_filename(fence_rest: &str) -> Option<String> {
    fence_rest
        .split_whitespace()
        .filter(|token| *token != "#")
        .find(|token| {
            token
                .rsplit_once('.')
                .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        })
        .map(ToString::to_string)
}

/// Reject absolute paths and parent-directory traversal in salvaged names.
fn sanitize_relative(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return None;
    }
    if path
        .components()
        .any(|component| matches!(component, std::path::Component::ParentDir))
    {
        return None;
    }
    Some(path.to_path_buf())
}
