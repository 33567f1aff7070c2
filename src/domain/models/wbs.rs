//! Serde model of the WBS (Work Breakdown Structure) input document.
//!
//! The document is a YAML file with a list of phases, each listing tasks
//! with optional dependencies and prompts. Unknown fields are ignored.

use std::path::Path;

use serde::Deserialize;

use crate::domain::errors::{DomainError, DomainResult};

/// Root of the WBS document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WbsDocument {
    /// Optional project metadata.
    #[serde(default)]
    pub project: Option<ProjectMeta>,
    /// Ordered phases; phase order defines task load order.
    #[serde(default)]
    pub phases: Vec<WbsPhase>,
}

/// Project-level metadata carried on the document root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectMeta {
    #[serde(default)]
    pub name: Option<String>,
}

/// A named grouping of tasks with an optional single-phase predecessor.
#[derive(Debug, Clone, Deserialize)]
pub struct WbsPhase {
    pub id: String,
    /// All tasks of this phase must wait for every task of the named phase.
    #[serde(default)]
    pub depends_on_phase: Option<String>,
    #[serde(default)]
    pub tasks: Vec<WbsTask>,
}

/// A task declaration inside a phase.
#[derive(Debug, Clone, Deserialize)]
pub struct WbsTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl WbsDocument {
    /// Read and parse a WBS file.
    pub fn from_path(path: &Path) -> DomainResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DomainError::WbsLoad(format!("{}: {e}", path.display())))?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}
