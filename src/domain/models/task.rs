//! Task domain model.
//!
//! Tasks are discrete units of work executed by the external agent.
//! They form a DAG through task-level dependencies and phase ordering.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Defined but not yet dispatched.
    Pending,
    /// Currently being executed by an agent.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A unit of work declared in the WBS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, unique across the whole WBS.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Ids of tasks that must complete before this one may start.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Current lifecycle state.
    #[serde(default)]
    pub status: TaskStatus,
    /// Owning phase, implicit from WBS load order.
    pub phase_id: Option<String>,
    /// Agent prompt, opaque to the orchestrator core.
    pub prompt: Option<String>,
}

impl Task {
    /// Create a pending task with no dependencies.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dependencies: Vec::new(),
            status: TaskStatus::default(),
            phase_id: None,
            prompt: None,
        }
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if task_id != self.id && !self.dependencies.contains(&task_id) {
            self.dependencies.push(task_id);
        }
        self
    }

    /// The prompt handed to the agent; falls back to a generic instruction
    /// when the WBS did not declare one.
    pub fn prompt_text(&self) -> String {
        self.prompt
            .clone()
            .unwrap_or_else(|| format!("Execute task: {}", self.name))
    }
}
