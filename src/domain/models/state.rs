//! Persisted execution state for crash recovery and resume.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// On-disk shape of the execution state file.
///
/// Only lifecycle state is checkpointed; sandbox contents are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub timestamp: DateTime<Utc>,
    pub task_status: BTreeMap<String, TaskStatus>,
}

impl PersistedState {
    /// Snapshot of the given lifecycle map at the current time.
    pub fn now(task_status: BTreeMap<String, TaskStatus>) -> Self {
        Self {
            timestamp: Utc::now(),
            task_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wire_shape() {
        let mut status = BTreeMap::new();
        status.insert("task-001".to_string(), TaskStatus::Completed);
        status.insert("task-002".to_string(), TaskStatus::Pending);

        let state = PersistedState::now(status);
        let value: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["task_status"]["task-001"], "completed");
        assert_eq!(value["task_status"]["task-002"], "pending");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_state_round_trip() {
        let mut status = BTreeMap::new();
        status.insert("task-001".to_string(), TaskStatus::Failed);
        let state = PersistedState::now(status);

        let json = serde_json::to_string(&state).unwrap();
        let parsed: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.task_status["task-001"], TaskStatus::Failed);
    }
}
