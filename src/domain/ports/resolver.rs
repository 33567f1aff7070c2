//! Conflict-resolution port.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::models::Resolution;

/// Delegated merge seam used by the workspace engine.
///
/// Implementations are infallible by signature: every failure path must be
/// reported as a [`Resolution`] with the version strategy so integration
/// always has a fallback.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    /// Merge two competing versions of the same file.
    async fn resolve_two_way(
        &self,
        existing: &Path,
        incoming: &Path,
        task_id: &str,
    ) -> Resolution;

    /// Merge concurrent modifications against a common ancestor.
    ///
    /// `base` is `None` when the file did not exist at task start.
    async fn resolve_three_way(
        &self,
        base: Option<&Path>,
        shared: &Path,
        task: &Path,
        task_id: &str,
    ) -> Resolution;
}
