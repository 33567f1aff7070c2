//! Progress events emitted by the orchestrator.
//!
//! Events serialize to `{type, timestamp, ...payload}` for JSON consumers;
//! CLI rendering subscribes through a [`ProgressCallback`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-status task counts for a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Payload of a progress event, discriminated by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressPayload {
    ProjectStarted { summary: ProgressSummary },
    TaskStarted { task_id: String, task_name: String },
    TaskCompleted { task_id: String },
    TaskFailed { task_id: String, error: String },
    ProgressUpdate { summary: ProgressSummary },
    ProjectCompleted { summary: ProgressSummary },
}

impl ProgressPayload {
    /// The wire value of the `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProjectStarted { .. } => "project_started",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::ProgressUpdate { .. } => "progress_update",
            Self::ProjectCompleted { .. } => "project_completed",
        }
    }
}

/// A timestamped progress event.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    #[serde(flatten)]
    pub payload: ProgressPayload,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Wrap a payload with the current time.
    pub fn now(payload: ProgressPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Subscriber invoked for every progress event.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ProgressEvent::now(ProgressPayload::TaskFailed {
            task_id: "task-001".to_string(),
            error: "boom".to_string(),
        });
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "task_failed");
        assert_eq!(value["task_id"], "task-001");
        assert_eq!(value["error"], "boom");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_summary_event_carries_counts() {
        let summary = ProgressSummary {
            total: 3,
            pending: 1,
            in_progress: 0,
            completed: 1,
            failed: 1,
        };
        let event = ProgressEvent::now(ProgressPayload::ProjectStarted { summary });
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "project_started");
        assert_eq!(value["summary"]["total"], 3);
        assert_eq!(value["summary"]["failed"], 1);
    }

    #[test]
    fn test_kind_matches_serde_tag() {
        let payload = ProgressPayload::TaskCompleted {
            task_id: "t".to_string(),
        };
        let value: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], payload.kind());
    }
}
