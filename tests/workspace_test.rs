//! Workspace engine integration tests.
//!
//! Covers sandbox provisioning, snapshot/diff behavior on disk,
//! integration into the shared workspace (including the 3-way conflict
//! path with a version-only resolver), single-file artifact integration
//! and registry persistence.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use maestro::domain::models::{RegistryDocument, Resolution};
use maestro::domain::ports::ConflictResolver;
use maestro::services::WorkspaceService;
use tempfile::TempDir;

/// A resolver that always falls back to versioned coexistence.
struct VersioningResolver;

#[async_trait]
impl ConflictResolver for VersioningResolver {
    async fn resolve_two_way(&self, _: &Path, _: &Path, _: &str) -> Resolution {
        Resolution::version("versioning resolver")
    }

    async fn resolve_three_way(
        &self,
        _: Option<&Path>,
        _: &Path,
        _: &Path,
        _: &str,
    ) -> Resolution {
        Resolution::version("versioning resolver")
    }
}

fn service(dir: &TempDir) -> WorkspaceService {
    WorkspaceService::new(dir.path().join("workspace"), None).unwrap()
}

#[tokio::test]
async fn test_parallel_non_conflicting_writes() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);

    let sandbox1 = workspace.prepare_sandbox("task-1").unwrap();
    let sandbox2 = workspace.prepare_sandbox("task-2").unwrap();

    fs::write(sandbox1.join("a.py"), "content a").unwrap();
    fs::write(sandbox2.join("b.py"), "content b").unwrap();

    let report1 = workspace.integrate("task-1", &sandbox1, None).await.unwrap();
    let report2 = workspace.integrate("task-2", &sandbox2, None).await.unwrap();

    assert_eq!(report1.new, 1);
    assert_eq!(report2.new, 1);
    assert_eq!(report1.conflict + report2.conflict, 0);

    let shared = workspace.shared_workspace();
    assert_eq!(fs::read_to_string(shared.join("a.py")).unwrap(), "content a");
    assert_eq!(fs::read_to_string(shared.join("b.py")).unwrap(), "content b");
}

#[tokio::test]
async fn test_disjoint_integrations_commute() {
    // Running the two integrations in either order yields the same tree.
    let mut trees = Vec::new();
    for order in [["task-1", "task-2"], ["task-2", "task-1"]] {
        let dir = TempDir::new().unwrap();
        let workspace = service(&dir);

        let sandbox1 = workspace.prepare_sandbox("task-1").unwrap();
        let sandbox2 = workspace.prepare_sandbox("task-2").unwrap();
        fs::write(sandbox1.join("a.py"), "content a").unwrap();
        fs::write(sandbox2.join("b.py"), "content b").unwrap();

        for task_id in order {
            let sandbox = if task_id == "task-1" { &sandbox1 } else { &sandbox2 };
            workspace.integrate(task_id, sandbox, None).await.unwrap();
        }
        trees.push(WorkspaceService::snapshot(workspace.shared_workspace()));
    }

    let paths: Vec<Vec<&String>> = trees.iter().map(|tree| tree.keys().collect()).collect();
    assert_eq!(paths[0], paths[1]);
    for path in trees[0].keys() {
        assert_eq!(trees[0][path].hash, trees[1][path].hash);
    }
}

#[tokio::test]
async fn test_modified_without_concurrent_change_overwrites() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);
    fs::create_dir_all(workspace.shared_workspace()).unwrap();
    fs::write(workspace.shared_workspace().join("app.py"), "v1").unwrap();

    let sandbox = workspace.prepare_sandbox("task-1").unwrap();
    assert_eq!(fs::read_to_string(sandbox.join("app.py")).unwrap(), "v1");
    fs::write(sandbox.join("app.py"), "v2").unwrap();

    let report = workspace.integrate("task-1", &sandbox, None).await.unwrap();
    assert_eq!(report.modified, 1);
    assert_eq!(report.conflict, 0);
    assert_eq!(
        fs::read_to_string(workspace.shared_workspace().join("app.py")).unwrap(),
        "v2"
    );
}

#[tokio::test]
async fn test_three_way_conflict_with_failed_merge() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);
    fs::create_dir_all(workspace.shared_workspace()).unwrap();
    fs::write(workspace.shared_workspace().join("conflict.py"), "original").unwrap();

    // Both tasks start from the same base.
    let sandbox1 = workspace.prepare_sandbox("task-1").unwrap();
    let sandbox2 = workspace.prepare_sandbox("task-2").unwrap();

    fs::write(sandbox1.join("conflict.py"), "task1").unwrap();
    let report = workspace.integrate("task-1", &sandbox1, None).await.unwrap();
    assert_eq!(report.modified, 1);

    // task-2 modified the same path concurrently; the resolver declines.
    fs::write(sandbox2.join("conflict.py"), "task2").unwrap();
    let resolver = VersioningResolver;
    let report = workspace
        .integrate("task-2", &sandbox2, Some(&resolver))
        .await
        .unwrap();
    assert_eq!(report.conflict, 1);
    assert_eq!(report.modified, 0);

    // No silent loss: the shared file keeps task-1's content and task-2's
    // version survives as a sidecar.
    let shared = workspace.shared_workspace();
    assert_eq!(fs::read_to_string(shared.join("conflict.py")).unwrap(), "task1");
    assert_eq!(
        fs::read_to_string(shared.join("conflict_task-2.py")).unwrap(),
        "task2"
    );
}

#[tokio::test]
async fn test_conflict_without_resolver_is_versioned() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);
    fs::create_dir_all(workspace.shared_workspace()).unwrap();
    fs::write(workspace.shared_workspace().join("lib.py"), "base").unwrap();

    let sandbox1 = workspace.prepare_sandbox("task-1").unwrap();
    let sandbox2 = workspace.prepare_sandbox("task-2").unwrap();

    fs::write(sandbox1.join("lib.py"), "first").unwrap();
    workspace.integrate("task-1", &sandbox1, None).await.unwrap();

    fs::write(sandbox2.join("lib.py"), "second").unwrap();
    let report = workspace.integrate("task-2", &sandbox2, None).await.unwrap();
    assert_eq!(report.conflict, 1);
    assert!(workspace.shared_workspace().join("lib_task-2.py").exists());
}

#[tokio::test]
async fn test_deleted_files_counted_but_retained() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);
    fs::create_dir_all(workspace.shared_workspace()).unwrap();
    fs::write(workspace.shared_workspace().join("keep.py"), "data").unwrap();

    let sandbox = workspace.prepare_sandbox("task-1").unwrap();
    fs::remove_file(sandbox.join("keep.py")).unwrap();

    let report = workspace.integrate("task-1", &sandbox, None).await.unwrap();
    assert_eq!(report.deleted, 1);
    // The shared tree is write-only to integrations; deletes never apply.
    assert!(workspace.shared_workspace().join("keep.py").exists());
}

#[tokio::test]
async fn test_prepare_sandbox_seeds_and_configures() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);
    fs::create_dir_all(workspace.shared_workspace().join("pkg")).unwrap();
    fs::write(workspace.shared_workspace().join("pkg/mod.py"), "x").unwrap();

    let sandbox = workspace.prepare_sandbox("task-1").unwrap();
    assert_eq!(sandbox, dir.path().join("workspace/task_task-1"));
    assert_eq!(fs::read_to_string(sandbox.join("pkg/mod.py")).unwrap(), "x");
    assert!(sandbox.join(".claude").is_dir());

    // Base snapshot retained for the seeded file until integration.
    let base_copy = dir.path().join("workspace/base_snapshots/task-1/pkg/mod.py");
    assert!(base_copy.exists());

    workspace.integrate("task-1", &sandbox, None).await.unwrap();
    assert!(!dir.path().join("workspace/base_snapshots/task-1").exists());
}

#[tokio::test]
async fn test_empty_sandbox_has_no_base_snapshot() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);

    workspace.prepare_sandbox("task-1").unwrap();
    assert!(!dir.path().join("workspace/base_snapshots/task-1").exists());
}

#[tokio::test]
async fn test_prepare_sandbox_replaces_existing() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);

    let sandbox = workspace.prepare_sandbox("task-1").unwrap();
    fs::write(sandbox.join("stale.py"), "left over").unwrap();

    let sandbox = workspace.prepare_sandbox("task-1").unwrap();
    assert!(!sandbox.join("stale.py").exists());
}

#[tokio::test]
async fn test_integrate_artifact_versions_on_conflict() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);
    let dest = dir.path().join("integrated");
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("report.md"), "existing").unwrap();

    let source_dir = dir.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join("report.md"), "incoming").unwrap();

    let written = workspace
        .integrate_artifact(&source_dir.join("report.md"), &dest, "task-9", None)
        .await
        .unwrap();

    // The destination file is never silently overwritten.
    assert_eq!(written, dest.join("report_task-9.md"));
    assert_eq!(fs::read_to_string(dest.join("report.md")).unwrap(), "existing");
    assert_eq!(fs::read_to_string(&written).unwrap(), "incoming");
}

#[tokio::test]
async fn test_integrate_artifact_plain_copy() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);
    let dest = dir.path().join("integrated");

    let source_dir = dir.path().join("out");
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join("new.md"), "fresh").unwrap();

    let written = workspace
        .integrate_artifact(&source_dir.join("new.md"), &dest, "task-9", None)
        .await
        .unwrap();
    assert_eq!(written, dest.join("new.md"));
    assert_eq!(fs::read_to_string(written).unwrap(), "fresh");
}

#[test]
fn test_registry_round_trip_on_disk() {
    let dir = TempDir::new().unwrap();
    let registry_path = dir.path().join("workspace/artifact_registry.json");

    let output_dir = dir.path().join("out");
    fs::create_dir_all(&output_dir).unwrap();
    fs::write(output_dir.join("models.py"), "class User: pass").unwrap();
    fs::write(output_dir.join("routes.py"), "routes = []").unwrap();

    {
        let workspace =
            WorkspaceService::new(dir.path().join("workspace"), Some(registry_path.clone()))
                .unwrap();
        let artifacts = workspace
            .register_task_artifacts("task-1", "Build API", &output_dir)
            .unwrap();
        assert_eq!(artifacts.artifacts.len(), 2);
        assert_eq!(artifacts.task_name, "Build API");
    }

    // The persisted document has the documented shape.
    let raw = fs::read_to_string(&registry_path).unwrap();
    let document: RegistryDocument = serde_json::from_str(&raw).unwrap();
    assert!(document.registry.contains_key("task-1"));
    assert_eq!(document.file_index["models.py"], vec!["task-1"]);

    // A fresh engine loads it back.
    let workspace =
        WorkspaceService::new(dir.path().join("workspace"), Some(registry_path)).unwrap();
    let loaded = workspace.task_artifacts("task-1").unwrap();
    assert_eq!(loaded.artifacts.len(), 2);
    assert!(loaded.artifacts.iter().all(|a| a.task_id == "task-1"));
    assert_eq!(workspace.tasks_by_file("routes.py"), vec!["task-1"]);
}

#[test]
fn test_file_conflict_detection_across_tasks() {
    let dir = TempDir::new().unwrap();
    let workspace = service(&dir);

    for task_id in ["task-1", "task-2"] {
        let output_dir = dir.path().join(task_id);
        fs::create_dir_all(&output_dir).unwrap();
        fs::write(output_dir.join("main.py"), task_id).unwrap();
        workspace
            .register_task_artifacts(task_id, "writer", &output_dir)
            .unwrap();
    }

    let conflicts = workspace.detect_file_conflicts();
    assert_eq!(conflicts["main.py"], vec!["task-1", "task-2"]);

    let summary = workspace.registry_summary();
    assert_eq!(summary.total_tasks, 2);
    assert_eq!(summary.total_artifacts, 2);
    assert_eq!(summary.file_conflicts, 1);
    assert_eq!(summary.unique_files, 1);
}
