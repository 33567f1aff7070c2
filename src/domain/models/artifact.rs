//! Artifact and snapshot domain models.
//!
//! Snapshots capture the state of a directory tree as content hashes so
//! that task output can be diffed against the state the task started from.
//! Artifacts describe the files a task produced, tracked in a registry
//! persisted next to the workspace root.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded for one file in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// First 16 hex characters of the SHA-256 of the file contents.
    pub hash: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification timestamp.
    pub mtime: DateTime<Utc>,
}

/// Mapping of workspace-relative path to file metadata.
///
/// A `BTreeMap` keeps iteration deterministic, which keeps diff output and
/// integration ordering deterministic.
pub type Snapshot = BTreeMap<String, FileMetadata>;

/// Classified differences between two snapshots. Unchanged paths are not
/// emitted. All vectors are sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Present in current but not in base.
    pub new: Vec<String>,
    /// Present in both with differing hashes.
    pub modified: Vec<String>,
    /// Present in base but not in current.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Counters returned by an integration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrationReport {
    pub new: usize,
    pub modified: usize,
    pub conflict: usize,
    pub deleted: usize,
}

/// A single file produced by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub filename: String,
    /// Path relative to the task workspace.
    pub path: String,
    pub size: u64,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    /// Producing task. Denormalized copy of the registry key; refreshed on
    /// load, never treated as authoritative.
    pub task_id: String,
}

/// The full artifact set of one completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArtifacts {
    pub task_id: String,
    pub task_name: String,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl TaskArtifacts {
    pub fn new(task_id: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task_name: task_name.into(),
            completed_at: Utc::now(),
            artifacts: Vec::new(),
        }
    }

    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// Filenames of every artifact in this set.
    pub fn filenames(&self) -> Vec<String> {
        self.artifacts.iter().map(|a| a.filename.clone()).collect()
    }
}

/// On-disk shape of the artifact registry JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub registry: BTreeMap<String, TaskArtifacts>,
    /// Secondary index: filename to producing task ids, for conflict
    /// discovery.
    #[serde(default)]
    pub file_index: BTreeMap<String, Vec<String>>,
}

/// Aggregate numbers over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub total_tasks: usize,
    pub total_artifacts: usize,
    pub total_size: u64,
    pub file_conflicts: usize,
    pub unique_files: usize,
}
