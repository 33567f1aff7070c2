//! Domain errors for the maestro orchestrator.

use thiserror::Error;

/// Domain-level errors that can occur while loading or driving a project.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Circular dependency detected involving task {0}")]
    DependencyCycle(String),

    #[error("Failed to load WBS: {0}")]
    WbsLoad(String),

    #[error("Failed to parse WBS: {0}")]
    WbsParse(#[from] serde_yaml::Error),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Task timeout after {0}s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;
