//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure
//! concerns.

pub mod artifact;
pub mod config;
pub mod event;
pub mod execution;
pub mod resolution;
pub mod state;
pub mod task;
pub mod wbs;

pub use artifact::{
    Artifact, ChangeSet, FileMetadata, IntegrationReport, RegistryDocument, RegistrySummary,
    Snapshot, TaskArtifacts,
};
pub use config::{AgentConfig, Config, LoggingConfig, WorkspaceConfig};
pub use event::{ProgressCallback, ProgressEvent, ProgressPayload, ProgressSummary};
pub use execution::{ExecutionResult, TaskSpec};
pub use resolution::{Resolution, ResolutionStrategy};
pub use state::PersistedState;
pub use task::{Task, TaskStatus};
pub use wbs::{ProjectMeta, WbsDocument, WbsPhase, WbsTask};
