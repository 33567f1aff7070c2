//! Delegated conflict resolution.
//!
//! Turns a concurrent write into a merge task for the external agent. The
//! resolver never inspects file contents itself: it formats a prompt
//! embedding the competing versions and launches a merge sub-agent through
//! its own task runner, rooted at `<workspace>/.merge_tasks`. The outcome
//! is classified from the files the sub-agent leaves in its sandbox.
//!
//! Every failure path yields a version-strategy [`Resolution`]; the
//! resolver never returns an error to its caller.

use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{Resolution, TaskSpec};
use crate::domain::ports::ConflictResolver;
use crate::services::task_runner::TaskRunner;
use crate::services::workspace::WorkspaceService;

/// Marker file a merge sub-agent writes when the versions cannot be
/// combined.
const CANNOT_MERGE_FILE: &str = "CANNOT_MERGE.txt";

/// Agent-delegated implementation of the [`ConflictResolver`] port.
pub struct MergeResolver {
    runner: TaskRunner,
    workspace: WorkspaceService,
}

impl MergeResolver {
    /// Create a resolver whose merge sub-agents run under
    /// `<workspace_dir>/.merge_tasks` with their own concurrency limit.
    pub fn new(
        workspace_dir: &Path,
        agent_path: impl Into<String>,
        timeout: Duration,
        max_concurrent: usize,
    ) -> DomainResult<Self> {
        let merge_root = workspace_dir.join(".merge_tasks");
        Ok(Self {
            runner: TaskRunner::new(agent_path, max_concurrent, timeout),
            workspace: WorkspaceService::new(merge_root, None)?,
        })
    }

    /// Launch the merge sub-agent and classify what it left behind.
    async fn run_merge(
        &self,
        merge_id: String,
        name: String,
        prompt: String,
        filename: &str,
    ) -> Resolution {
        let spec = TaskSpec::new(merge_id, name, prompt);
        let result = self.runner.execute(&spec, Some(&self.workspace)).await;

        if !result.success {
            let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
            error!(merge_id = %spec.id, %reason, "merge task failed");
            return Resolution::version(format!("Merge task failed: {reason}"));
        }

        let Some(sandbox) = result.workspace else {
            return Resolution::version("Merge task produced no sandbox");
        };

        let cannot_merge = sandbox.join(CANNOT_MERGE_FILE);
        if cannot_merge.exists() {
            let reason = fs::read_to_string(&cannot_merge).unwrap_or_default();
            info!(merge_id = %spec.id, file = filename, "sub-agent declined to merge");
            return Resolution::version(format!("Cannot merge: {reason}"));
        }

        let merged = sandbox.join(filename);
        if merged.exists() {
            info!(merge_id = %spec.id, file = filename, "successfully merged");
            return Resolution::merged(merged, "Successfully merged by agent");
        }

        warn!(merge_id = %spec.id, file = filename, "merge completed but no output file found");
        Resolution::version("Merge completed but no output file found")
    }
}

#[async_trait]
impl ConflictResolver for MergeResolver {
    async fn resolve_two_way(
        &self,
        existing: &Path,
        incoming: &Path,
        task_id: &str,
    ) -> Resolution {
        let Some(filename) = file_name(existing) else {
            return Resolution::version("Existing file has no file name");
        };
        let merge_id = format!("merge_{}_{}", file_stem(existing), Utc::now().timestamp());

        let prompt = match two_way_prompt(existing, incoming) {
            Ok(prompt) => prompt,
            Err(error) => return Resolution::version(format!("Merge exception: {error}")),
        };

        info!(task_id, file = %filename, "attempting to merge with agent");
        self.run_merge(merge_id, format!("Merge {filename}"), prompt, &filename)
            .await
    }

    async fn resolve_three_way(
        &self,
        base: Option<&Path>,
        shared: &Path,
        task: &Path,
        task_id: &str,
    ) -> Resolution {
        let Some(filename) = file_name(shared) else {
            return Resolution::version("Shared file has no file name");
        };
        let merge_id = format!("3way_merge_{}_{}", file_stem(shared), Utc::now().timestamp());

        let prompt = match three_way_prompt(base, shared, task) {
            Ok(prompt) => prompt,
            Err(error) => return Resolution::version(format!("3-way merge exception: {error}")),
        };

        info!(task_id, file = %filename, "attempting 3-way merge with agent");
        self.run_merge(merge_id, format!("3-way merge {filename}"), prompt, &filename)
            .await
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Prompt for a 2-way merge, embedding both file bodies verbatim.
fn two_way_prompt(existing: &Path, incoming: &Path) -> std::io::Result<String> {
    let existing_content = fs::read_to_string(existing)?;
    let incoming_content = fs::read_to_string(incoming)?;
    let filename = existing
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let incoming_origin = incoming
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(format!(
        r#"You are tasked with merging two versions of {filename}.

Please analyze both files and create an intelligent merge that:
1. Combines functionality from both versions
2. Resolves any conflicts appropriately
3. Maintains code quality and consistency

If the files serve fundamentally different purposes or cannot be meaningfully merged:
- Create a file named "{CANNOT_MERGE_FILE}" explaining why
- Do NOT create the merged file

Otherwise:
- Create the merged version as {filename}
- Add a comment at the top explaining what was merged

=== Current version ({filename}) ===
{existing_content}

=== New version (from {incoming_origin}) ===
{incoming_content}

Please create the merged version now.
"#
    ))
}

/// Prompt for a 3-way merge with labeled BASE / SHARED / TASK sections.
/// The BASE section carries a literal placeholder when the file did not
/// exist at task start.
fn three_way_prompt(
    base: Option<&Path>,
    shared: &Path,
    task: &Path,
) -> std::io::Result<String> {
    let base_content = match base {
        Some(path) if path.exists() => fs::read_to_string(path)?,
        _ => String::new(),
    };
    let shared_content = fs::read_to_string(shared)?;
    let task_content = fs::read_to_string(task)?;
    let filename = shared
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let base_section = if base_content.is_empty() {
        "# File did not exist in base version".to_string()
    } else {
        base_content
    };

    Ok(format!(
        r#"You are tasked with performing a 3-way merge for {filename}.

This is a 3-way merge scenario where:
- BASE: The original version both changes started from
- SHARED: Changes made by other tasks in the shared workspace
- TASK: Changes made by the current task

Please analyze all three versions and create an intelligent merge that:
1. Incorporates changes from both SHARED and TASK versions
2. Resolves conflicts by understanding the intent of each change
3. Maintains code quality and consistency
4. Preserves all functionality from both versions

If the changes are fundamentally incompatible:
- Create a file named "{CANNOT_MERGE_FILE}" explaining why
- Do NOT create the merged file

Otherwise:
- Create the merged version as {filename}
- Add a comment at the top explaining the merge

=== BASE version (original) ===
{base_section}

=== SHARED version (from shared workspace) ===
{shared_content}

=== TASK version (from current task) ===
{task_content}

Please create the merged version now, incorporating changes from both SHARED and TASK versions.
"#
    ))
}
