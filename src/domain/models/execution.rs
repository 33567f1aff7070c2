//! Task execution inputs and results.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// What the task runner needs to dispatch one agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: String,
    pub name: String,
    pub prompt: String,
    /// Extra files passed to the agent with `-f`.
    pub context_files: Vec<PathBuf>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prompt: prompt.into(),
            context_files: Vec::new(),
        }
    }
}

/// Outcome of one agent invocation. Failures are captured here, never
/// propagated as errors.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub task_id: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    /// Sandbox-relative paths of every file present after execution.
    pub artifacts: Vec<String>,
    pub execution_secs: f64,
    /// The sandbox the task ran in, when one was provisioned.
    pub workspace: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    /// A failed result carrying only the error description.
    pub fn failure(
        task_id: impl Into<String>,
        error: impl Into<String>,
        execution_secs: f64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error.into()),
            artifacts: Vec::new(),
            execution_secs,
            workspace: None,
            timestamp: Utc::now(),
        }
    }
}
