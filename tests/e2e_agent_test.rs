//! Full-pipeline tests with a stub agent binary.
//!
//! Unlike the dry-run tests, these drive the real execution path: sandbox
//! provisioning, subprocess invocation, integration into the shared tree,
//! artifact registration and the final `integrated/` collection.
#![cfg(unix)]

mod common;

use std::fs;
use std::time::Duration;

use maestro::domain::models::RegistryDocument;
use maestro::services::{Orchestrator, OrchestratorOptions};
use tempfile::TempDir;

fn options(dir: &TempDir, agent: &std::path::Path) -> OrchestratorOptions {
    OrchestratorOptions {
        workspace_dir: dir.path().join("workspace"),
        agent_path: agent.to_string_lossy().into_owned(),
        max_concurrent: 2,
        task_timeout: Duration::from_secs(60),
        merge_timeout: Duration::from_secs(60),
        ..OrchestratorOptions::default()
    }
}

#[tokio::test]
async fn test_two_tasks_converge_in_shared_workspace() {
    let dir = TempDir::new().unwrap();
    // Each task writes a file named after a token in its prompt.
    let agent = common::write_stub_agent(
        dir.path(),
        "agent.sh",
        r#"case "$2" in
  *alpha*) printf 'alpha content' > alpha.py ;;
  *beta*) printf 'beta content' > beta.py ;;
esac"#,
    );
    let wbs = common::write_wbs(
        dir.path(),
        r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: Write alpha
        prompt: produce alpha
      - id: task-002
        name: Write beta
        prompt: produce beta
",
    );

    let mut orchestrator = Orchestrator::new(&wbs, options(&dir, &agent)).unwrap();
    let results = orchestrator.run().await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.success));
    assert!(orchestrator.graph().done());

    // Both files converged into the shared tree with exact contents.
    let shared = dir.path().join("workspace/shared");
    assert_eq!(fs::read_to_string(shared.join("alpha.py")).unwrap(), "alpha content");
    assert_eq!(fs::read_to_string(shared.join("beta.py")).unwrap(), "beta content");

    // The registry recorded both tasks.
    let raw = fs::read_to_string(dir.path().join("workspace/artifact_registry.json")).unwrap();
    let registry: RegistryDocument = serde_json::from_str(&raw).unwrap();
    assert!(registry.registry.contains_key("task-001"));
    assert!(registry.registry.contains_key("task-002"));
    assert_eq!(registry.file_index["alpha.py"], vec!["task-001"]);

    // Final collection wrote the artifacts plus a README.
    let integrated = dir.path().join("workspace/integrated");
    assert!(integrated.join("alpha.py").exists());
    assert!(integrated.join("beta.py").exists());
    let readme = fs::read_to_string(integrated.join("README.md")).unwrap();
    assert!(readme.contains("alpha.py"));
    assert!(readme.contains("beta.py"));
}

#[tokio::test]
async fn test_downstream_task_sees_upstream_output() {
    let dir = TempDir::new().unwrap();
    let agent = common::write_stub_agent(
        dir.path(),
        "agent.sh",
        r#"case "$2" in
  *first*) printf 'from first' > first.txt ;;
  *second*) cat first.txt > second.txt ;;
esac"#,
    );
    let wbs = common::write_wbs(
        dir.path(),
        r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: First writer
        prompt: do first
      - id: task-002
        name: Second writer
        prompt: do second
        dependencies: [task-001]
",
    );

    let mut orchestrator = Orchestrator::new(&wbs, options(&dir, &agent)).unwrap();
    let results = orchestrator.run().await.unwrap();
    assert!(results.iter().all(|result| result.success), "{results:?}");

    // task-002's sandbox was seeded after task-001's integration, so it
    // could read first.txt.
    let shared = dir.path().join("workspace/shared");
    assert_eq!(fs::read_to_string(shared.join("second.txt")).unwrap(), "from first");
}

#[tokio::test]
async fn test_agent_failure_marks_task_failed() {
    let dir = TempDir::new().unwrap();
    let agent = common::write_stub_agent(dir.path(), "agent.sh", "exit 2");
    let wbs = common::write_wbs(
        dir.path(),
        r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: Doomed
        prompt: anything
",
    );

    let mut orchestrator = Orchestrator::new(&wbs, options(&dir, &agent)).unwrap();
    let results = orchestrator.run().await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].error.as_deref(), Some("Process exited with code 2"));
    assert_eq!(orchestrator.summary().failed, 1);
}
