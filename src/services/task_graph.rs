//! Task graph engine.
//!
//! Loads the WBS into an in-memory task map, validates that the union of
//! task dependencies and phase ordering forms a DAG, and answers frontier
//! queries for the orchestrator.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ProgressSummary, Task, TaskStatus, WbsDocument};

/// Owns task lifecycle state and the dependency structure.
#[derive(Debug)]
pub struct TaskGraphEngine {
    tasks: HashMap<String, Task>,
    /// Task ids in WBS load order; keeps frontier queries deterministic.
    order: Vec<String>,
    /// Phase id to the phase it depends on.
    phase_dependencies: HashMap<String, String>,
    /// Phase id to the ids of its member tasks, in load order.
    phase_members: HashMap<String, Vec<String>>,
}

impl TaskGraphEngine {
    /// Load and validate a WBS file.
    pub fn from_path(wbs_path: &Path) -> DomainResult<Self> {
        let document = WbsDocument::from_path(wbs_path)?;
        Self::from_document(&document)
    }

    /// Build and validate the graph from a parsed WBS document.
    pub fn from_document(document: &WbsDocument) -> DomainResult<Self> {
        let mut tasks = HashMap::new();
        let mut order = Vec::new();
        let mut phase_dependencies = HashMap::new();
        let mut phase_members: HashMap<String, Vec<String>> = HashMap::new();

        for phase in &document.phases {
            if let Some(ref depends_on) = phase.depends_on_phase {
                phase_dependencies.insert(phase.id.clone(), depends_on.clone());
            }

            for declared in &phase.tasks {
                if tasks.contains_key(&declared.id) {
                    return Err(DomainError::WbsLoad(format!(
                        "duplicate task id: {}",
                        declared.id
                    )));
                }
                let task = Task {
                    id: declared.id.clone(),
                    name: declared.name.clone(),
                    dependencies: declared.dependencies.clone(),
                    status: TaskStatus::Pending,
                    phase_id: Some(phase.id.clone()),
                    prompt: declared.prompt.clone(),
                };
                order.push(task.id.clone());
                phase_members
                    .entry(phase.id.clone())
                    .or_default()
                    .push(task.id.clone());
                tasks.insert(task.id.clone(), task);
            }
        }

        let engine = Self {
            tasks,
            order,
            phase_dependencies,
            phase_members,
        };
        engine.validate_dependencies()?;
        debug!(
            tasks = engine.order.len(),
            phases = engine.phase_members.len(),
            "task graph loaded"
        );
        Ok(engine)
    }

    /// Verify that every dependency exists and that the union of task and
    /// phase edges is acyclic.
    fn validate_dependencies(&self) -> DomainResult<()> {
        for task in self.tasks.values() {
            for dep_id in &task.dependencies {
                if !self.tasks.contains_key(dep_id) {
                    return Err(DomainError::WbsLoad(format!(
                        "task {} depends on unknown task {dep_id}",
                        task.id
                    )));
                }
            }
        }

        let mut visited = HashSet::new();
        for task_id in &self.order {
            if !visited.contains(task_id) {
                let mut rec_stack = HashSet::new();
                if self.has_cycle(task_id, &mut visited, &mut rec_stack) {
                    return Err(DomainError::DependencyCycle(task_id.clone()));
                }
            }
        }
        Ok(())
    }

    /// DFS with a recursion stack over the union of task-dependency edges
    /// and phase-implied edges.
    fn has_cycle(
        &self,
        task_id: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
    ) -> bool {
        visited.insert(task_id.to_string());
        rec_stack.insert(task_id.to_string());

        for dep_id in self.edges_of(task_id) {
            if !visited.contains(&dep_id) {
                if self.has_cycle(&dep_id, visited, rec_stack) {
                    return true;
                }
            } else if rec_stack.contains(&dep_id) {
                return true;
            }
        }

        rec_stack.remove(task_id);
        false
    }

    /// Everything `task_id` waits on: its declared dependencies plus every
    /// task of its phase's predecessor phase.
    fn edges_of(&self, task_id: &str) -> Vec<String> {
        let Some(task) = self.tasks.get(task_id) else {
            return Vec::new();
        };
        let mut edges = task.dependencies.clone();
        if let Some(ref phase_id) = task.phase_id {
            if let Some(predecessor) = self.phase_dependencies.get(phase_id) {
                if let Some(members) = self.phase_members.get(predecessor) {
                    edges.extend(members.iter().cloned());
                }
            }
        }
        edges
    }

    /// Whether a phase's predecessor (if any) has every member task
    /// completed.
    fn is_phase_ready(&self, phase_id: &str) -> bool {
        let Some(depends_on) = self.phase_dependencies.get(phase_id) else {
            return true;
        };
        self.phase_members
            .get(depends_on)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .all(|id| self.tasks[id].status == TaskStatus::Completed)
    }

    /// The runnable frontier: pending tasks whose dependencies are all
    /// completed and whose phase predecessor is fully completed. Returned
    /// in WBS load order.
    pub fn runnable(&self) -> Vec<&Task> {
        self.order
            .iter()
            .map(|id| &self.tasks[id])
            .filter(|task| {
                if task.status != TaskStatus::Pending {
                    return false;
                }
                if let Some(ref phase_id) = task.phase_id {
                    if !self.is_phase_ready(phase_id) {
                        return false;
                    }
                }
                task.dependencies
                    .iter()
                    .all(|dep_id| self.tasks[dep_id].status == TaskStatus::Completed)
            })
            .collect()
    }

    /// Set a task's lifecycle state. No transition matrix is enforced; the
    /// orchestrator is trusted.
    pub fn update(&mut self, task_id: &str, status: TaskStatus) -> DomainResult<()> {
        match self.tasks.get_mut(task_id) {
            Some(task) => {
                task.status = status;
                Ok(())
            }
            None => Err(DomainError::TaskNotFound(task_id.to_string())),
        }
    }

    /// Current lifecycle state of a task.
    pub fn status(&self, task_id: &str) -> DomainResult<TaskStatus> {
        self.tasks
            .get(task_id)
            .map(|task| task.status)
            .ok_or_else(|| DomainError::TaskNotFound(task_id.to_string()))
    }

    /// Look up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// All tasks in WBS load order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().map(|id| &self.tasks[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether every task has completed.
    pub fn done(&self) -> bool {
        self.tasks
            .values()
            .all(|task| task.status == TaskStatus::Completed)
    }

    /// Per-status task counts.
    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary {
            total: self.tasks.len(),
            ..ProgressSummary::default()
        };
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_from_yaml(yaml: &str) -> DomainResult<TaskGraphEngine> {
        let document: WbsDocument = serde_yaml::from_str(yaml).expect("test YAML should parse");
        TaskGraphEngine::from_document(&document)
    }

    const SIMPLE_WBS: &str = r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: Create models
      - id: task-002
        name: Create routes
        dependencies: [task-001]
";

    #[test]
    fn test_load_simple_wbs() {
        let engine = engine_from_yaml(SIMPLE_WBS).unwrap();
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.status("task-001").unwrap(), TaskStatus::Pending);
        assert_eq!(engine.task("task-002").unwrap().dependencies, vec!["task-001"]);
    }

    #[test]
    fn test_runnable_respects_dependencies() {
        let mut engine = engine_from_yaml(SIMPLE_WBS).unwrap();

        let runnable: Vec<&str> = engine.runnable().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(runnable, vec!["task-001"]);

        engine.update("task-001", TaskStatus::Completed).unwrap();
        let runnable: Vec<&str> = engine.runnable().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(runnable, vec!["task-002"]);
    }

    #[test]
    fn test_runnable_skips_non_pending() {
        let mut engine = engine_from_yaml(SIMPLE_WBS).unwrap();
        engine.update("task-001", TaskStatus::InProgress).unwrap();
        assert!(engine.runnable().is_empty());
    }

    #[test]
    fn test_phase_dependency_gates_tasks() {
        let yaml = r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: First
      - id: task-002
        name: Second
  - id: phase2
    depends_on_phase: phase1
    tasks:
      - id: task-003
        name: Third
";
        let mut engine = engine_from_yaml(yaml).unwrap();

        let runnable: Vec<&str> = engine.runnable().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(runnable, vec!["task-001", "task-002"]);

        // Completing only one task of phase1 does not unlock phase2.
        engine.update("task-001", TaskStatus::Completed).unwrap();
        let runnable: Vec<&str> = engine.runnable().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(runnable, vec!["task-002"]);

        engine.update("task-002", TaskStatus::Completed).unwrap();
        let runnable: Vec<&str> = engine.runnable().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(runnable, vec!["task-003"]);
    }

    #[test]
    fn test_circular_dependency_fails_load() {
        let yaml = r"
phases:
  - id: phase1
    tasks:
      - id: task-a
        name: A
        dependencies: [task-c]
      - id: task-b
        name: B
        dependencies: [task-a]
      - id: task-c
        name: C
        dependencies: [task-b]
";
        let err = engine_from_yaml(yaml).unwrap_err();
        assert!(matches!(err, DomainError::DependencyCycle(_)));
    }

    #[test]
    fn test_phase_cycle_fails_load() {
        // Task in phase1 depends on a task in phase2, while phase2 depends
        // on phase1 completing: a cycle in the union graph.
        let yaml = r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: First
        dependencies: [task-002]
  - id: phase2
    depends_on_phase: phase1
    tasks:
      - id: task-002
        name: Second
";
        let err = engine_from_yaml(yaml).unwrap_err();
        assert!(matches!(err, DomainError::DependencyCycle(_)));
    }

    #[test]
    fn test_unknown_dependency_fails_load() {
        let yaml = r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: First
        dependencies: [task-999]
";
        let err = engine_from_yaml(yaml).unwrap_err();
        match err {
            DomainError::WbsLoad(message) => assert!(message.contains("task-999")),
            other => panic!("Expected WbsLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_task_id_fails_load() {
        let yaml = r"
phases:
  - id: phase1
    tasks:
      - id: task-001
        name: First
  - id: phase2
    tasks:
      - id: task-001
        name: Duplicate
";
        let err = engine_from_yaml(yaml).unwrap_err();
        match err {
            DomainError::WbsLoad(message) => assert!(message.contains("duplicate")),
            other => panic!("Expected WbsLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_update_unknown_task() {
        let mut engine = engine_from_yaml(SIMPLE_WBS).unwrap();
        let err = engine.update("task-999", TaskStatus::Completed).unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
        assert!(matches!(
            engine.status("task-999"),
            Err(DomainError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_done_and_summary() {
        let mut engine = engine_from_yaml(SIMPLE_WBS).unwrap();
        assert!(!engine.done());

        engine.update("task-001", TaskStatus::Completed).unwrap();
        engine.update("task-002", TaskStatus::Failed).unwrap();
        assert!(!engine.done());

        let summary = engine.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pending, 0);

        engine.update("task-002", TaskStatus::Completed).unwrap();
        assert!(engine.done());
    }

    #[test]
    fn test_deadlock_implies_failure() {
        // With no tasks in progress, an empty frontier plus pending tasks
        // can only mean a failed dependency blocks the rest.
        let mut engine = engine_from_yaml(SIMPLE_WBS).unwrap();
        engine.update("task-001", TaskStatus::Failed).unwrap();

        let summary = engine.summary();
        assert!(engine.runnable().is_empty());
        assert_eq!(summary.in_progress, 0);
        assert!(summary.pending > 0);
        assert!(summary.failed > 0);
    }
}
