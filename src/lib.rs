//! Maestro - AI agent task orchestrator.
//!
//! Drives an external code-generation agent over a declarative Work
//! Breakdown Structure:
//! - Dependency-graph scheduler with phase ordering and resume
//! - Per-task sandbox workspaces seeded from a shared tree
//! - Snapshot-based diffing and serialized integration
//! - Delegated 2-way/3-way conflict resolution via merge sub-agents

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use services::{Orchestrator, OrchestratorOptions};
