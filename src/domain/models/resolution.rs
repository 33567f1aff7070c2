//! Conflict-resolution outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The delegated merge produced a single combined file.
    Merged,
    /// Both versions are kept; the task's copy goes to a versioned sidecar.
    Version,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merged => "merged",
            Self::Version => "version",
        }
    }
}

/// Result of a delegated merge attempt.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    /// Path of the merged file inside the merge sandbox, when merged.
    pub merged_path: Option<PathBuf>,
    pub message: String,
}

impl Resolution {
    pub fn merged(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            strategy: ResolutionStrategy::Merged,
            merged_path: Some(path),
            message: message.into(),
        }
    }

    pub fn version(message: impl Into<String>) -> Self {
        Self {
            strategy: ResolutionStrategy::Version,
            merged_path: None,
            message: message.into(),
        }
    }

    /// True only when the strategy is merged AND a merged file exists.
    pub fn is_merged(&self) -> bool {
        self.strategy == ResolutionStrategy::Merged && self.merged_path.is_some()
    }
}
