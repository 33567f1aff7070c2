//! Workspace and artifact engine.
//!
//! Owns the shared workspace tree, per-task sandboxes, base snapshots and
//! the artifact registry. Sandboxes are seeded from the shared tree at task
//! start; after execution the sandbox is diffed against its base snapshot
//! and the changes are applied back to the shared tree, with concurrent
//! modifications routed through a [`ConflictResolver`].
//!
//! Integration is serialized: the whole of [`WorkspaceService::integrate`]
//! runs under an internal async mutex.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, FileTimes};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Artifact, ChangeSet, FileMetadata, IntegrationReport, RegistryDocument, RegistrySummary,
    ResolutionStrategy, Snapshot, TaskArtifacts,
};
use crate::domain::ports::ConflictResolver;

/// Path components never captured in snapshots or artifact walks.
pub const EXCLUDED_COMPONENTS: [&str; 3] = [".git", "__pycache__", ".claude"];

/// Streaming block size for content hashing.
const HASH_BLOCK_SIZE: usize = 4096;

/// Snapshot hashes keep the first 16 hex characters of the SHA-256.
const HASH_PREFIX_LEN: usize = 16;

#[derive(Default)]
struct Inner {
    registry: BTreeMap<String, TaskArtifacts>,
    file_index: BTreeMap<String, Vec<String>>,
    task_snapshots: HashMap<String, Snapshot>,
}

/// The workspace engine. Shared across tasks via `Arc`; all mutation goes
/// through interior locks.
pub struct WorkspaceService {
    workspace_dir: PathBuf,
    shared_workspace: PathBuf,
    base_snapshots_dir: PathBuf,
    registry_path: Option<PathBuf>,
    inner: Mutex<Inner>,
    /// Serializes integrate() bodies, including resolver awaits.
    integrate_lock: tokio::sync::Mutex<()>,
}

impl WorkspaceService {
    /// Create the engine rooted at `workspace_dir`, loading the registry
    /// from `registry_path` when the file already exists.
    pub fn new(
        workspace_dir: impl Into<PathBuf>,
        registry_path: Option<PathBuf>,
    ) -> DomainResult<Self> {
        let workspace_dir = workspace_dir.into();
        fs::create_dir_all(&workspace_dir)?;

        let service = Self {
            shared_workspace: workspace_dir.join("shared"),
            base_snapshots_dir: workspace_dir.join("base_snapshots"),
            workspace_dir,
            registry_path,
            inner: Mutex::new(Inner::default()),
            integrate_lock: tokio::sync::Mutex::new(()),
        };
        service.load_registry()?;
        Ok(service)
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn shared_workspace(&self) -> &Path {
        &self.shared_workspace
    }

    // ------------------------------------------------------------------
    // Sandbox provisioning
    // ------------------------------------------------------------------

    /// Provision a fresh sandbox for a task: seed it from the shared
    /// workspace, install the agent configuration directory, record the
    /// base snapshot and retain copies of the base files for 3-way merge.
    ///
    /// Returns the sandbox path.
    #[instrument(skip(self))]
    pub fn prepare_sandbox(&self, task_id: &str) -> DomainResult<PathBuf> {
        let sandbox = self.workspace_dir.join(format!("task_{task_id}"));
        if sandbox.exists() {
            fs::remove_dir_all(&sandbox)?;
        }

        if self.shared_workspace.exists() {
            copy_tree(&self.shared_workspace, &sandbox)?;
            info!(task_id, sandbox = %sandbox.display(), "seeded sandbox from shared workspace");
        } else {
            fs::create_dir_all(&sandbox)?;
            info!(task_id, sandbox = %sandbox.display(), "created empty sandbox");
        }

        self.install_agent_config(&sandbox)?;

        let snapshot = Self::snapshot(&sandbox);
        self.save_base_files(task_id, &sandbox, &snapshot)?;
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .task_snapshots
            .insert(task_id.to_string(), snapshot);

        Ok(sandbox)
    }

    /// Copy the project-level `.claude` directory into the sandbox, or
    /// generate a minimal settings file granting the Write permission.
    fn install_agent_config(&self, sandbox: &Path) -> DomainResult<()> {
        let project_claude = std::env::current_dir()?.join(".claude");
        let sandbox_claude = sandbox.join(".claude");

        if project_claude.exists() {
            if sandbox_claude.exists() {
                fs::remove_dir_all(&sandbox_claude)?;
            }
            copy_tree(&project_claude, &sandbox_claude)?;
            debug!(sandbox = %sandbox.display(), "copied project .claude directory");
        } else {
            fs::create_dir_all(&sandbox_claude)?;
            let settings = serde_json::json!({
                "permissions": {
                    "allow": ["Write"]
                }
            });
            fs::write(
                sandbox_claude.join("settings.json"),
                serde_json::to_string_pretty(&settings)?,
            )?;
            debug!(sandbox = %sandbox.display(), "created .claude/settings.json with Write permission");
        }
        Ok(())
    }

    /// Retain verbatim copies of the sandbox's base files so 3-way merges
    /// can read the common ancestor. Nothing is created when the sandbox
    /// holds no non-excluded files.
    fn save_base_files(
        &self,
        task_id: &str,
        sandbox: &Path,
        snapshot: &Snapshot,
    ) -> DomainResult<()> {
        if snapshot.is_empty() {
            debug!(task_id, "no files to save as base");
            return Ok(());
        }

        let task_base_dir = self.base_snapshots_dir.join(task_id);
        fs::create_dir_all(&task_base_dir)?;
        for relative in snapshot.keys() {
            let destination = task_base_dir.join(relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_file(&sandbox.join(relative), &destination)?;
        }
        info!(task_id, files = snapshot.len(), "saved base snapshot files");
        Ok(())
    }

    /// Path of a retained base file, if it exists for this task.
    fn base_file(&self, task_id: &str, relative: &str) -> Option<PathBuf> {
        let path = self.base_snapshots_dir.join(task_id).join(relative);
        path.exists().then_some(path)
    }

    // ------------------------------------------------------------------
    // Snapshots and diffing
    // ------------------------------------------------------------------

    /// Snapshot a directory tree: relative path to content hash, size and
    /// mtime for every non-excluded regular file. Unreadable entries are
    /// skipped with a warning; a missing directory yields an empty
    /// snapshot.
    pub fn snapshot(directory: &Path) -> Snapshot {
        let mut snapshot = Snapshot::new();
        if directory.exists() {
            walk_into_snapshot(directory, directory, &mut snapshot);
        }
        snapshot
    }

    /// Classify the differences between two snapshots. Unchanged paths are
    /// not emitted; output is sorted by path.
    pub fn diff(base: &Snapshot, current: &Snapshot) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for (path, metadata) in current {
            match base.get(path) {
                None => changes.new.push(path.clone()),
                Some(previous) if previous.hash != metadata.hash => {
                    changes.modified.push(path.clone());
                }
                Some(_) => {}
            }
        }
        for path in base.keys() {
            if !current.contains_key(path) {
                changes.deleted.push(path.clone());
            }
        }
        changes
    }

    // ------------------------------------------------------------------
    // Integration
    // ------------------------------------------------------------------

    /// Integrate a finished task's sandbox into the shared workspace.
    ///
    /// New files are copied in; modified files overwrite the shared copy
    /// unless the shared side changed concurrently, in which case the
    /// resolver's 3-way merge decides between a merged overwrite and a
    /// versioned sidecar. Deletions are counted but never applied.
    ///
    /// The whole body runs under an internal mutex so concurrent task
    /// completions integrate one at a time.
    #[instrument(skip(self, sandbox, resolver), fields(sandbox = %sandbox.display()))]
    pub async fn integrate(
        &self,
        task_id: &str,
        sandbox: &Path,
        resolver: Option<&dyn ConflictResolver>,
    ) -> DomainResult<IntegrationReport> {
        let _serialized = self.integrate_lock.lock().await;

        let base_snapshot = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .task_snapshots
            .get(task_id)
            .cloned()
            .unwrap_or_default();
        let task_snapshot = Self::snapshot(sandbox);
        let shared_snapshot = Self::snapshot(&self.shared_workspace);

        let changes = Self::diff(&base_snapshot, &task_snapshot);
        let mut report = IntegrationReport::default();

        fs::create_dir_all(&self.shared_workspace)?;

        for relative in &changes.new {
            let destination = self.shared_workspace.join(relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            copy_file(&sandbox.join(relative), &destination)?;
            info!(task_id, path = %relative, "added new file");
            report.new += 1;
        }

        for relative in &changes.modified {
            let source = sandbox.join(relative);
            let destination = self.shared_workspace.join(relative);

            let Some(shared_meta) = shared_snapshot.get(relative) else {
                // Gone from the shared side since task start; treat as new.
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)?;
                }
                copy_file(&source, &destination)?;
                info!(task_id, path = %relative, "re-added file");
                report.new += 1;
                continue;
            };

            let shared_unchanged = base_snapshot
                .get(relative)
                .is_some_and(|base_meta| base_meta.hash == shared_meta.hash);

            if shared_unchanged {
                copy_file(&source, &destination)?;
                info!(task_id, path = %relative, "updated file");
                report.modified += 1;
                continue;
            }

            // Concurrent modification on the shared side.
            let mut merged = false;
            if let Some(resolver) = resolver {
                info!(task_id, path = %relative, "attempting 3-way merge");
                let base_file = self.base_file(task_id, relative);
                let resolution = resolver
                    .resolve_three_way(base_file.as_deref(), &destination, &source, task_id)
                    .await;
                match resolution.merged_path.as_deref() {
                    Some(merged_path) if resolution.strategy == ResolutionStrategy::Merged => {
                        copy_file(merged_path, &destination)?;
                        info!(task_id, path = %relative, "merged file");
                        report.modified += 1;
                        merged = true;
                    }
                    _ => {
                        warn!(task_id, path = %relative, message = %resolution.message, "merge not applied");
                    }
                }
            }
            if !merged {
                let versioned = versioned_path(&destination, task_id);
                copy_file(&source, &versioned)?;
                warn!(
                    task_id,
                    path = %relative,
                    versioned = %versioned.display(),
                    "conflict saved as versioned sidecar"
                );
                report.conflict += 1;
            }
        }

        for relative in &changes.deleted {
            info!(task_id, path = %relative, "file deleted in task");
            report.deleted += 1;
        }

        info!(
            task_id,
            new = report.new,
            modified = report.modified,
            conflict = report.conflict,
            deleted = report.deleted,
            "integration complete"
        );

        // The common ancestor is no longer needed once the task has been
        // integrated.
        let task_base_dir = self.base_snapshots_dir.join(task_id);
        if task_base_dir.exists() {
            fs::remove_dir_all(&task_base_dir)?;
        }
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .task_snapshots
            .remove(task_id);

        Ok(report)
    }

    /// Copy a single artifact into a destination directory. A pre-existing
    /// destination file is never silently overwritten: the resolver's
    /// 2-way merge is attempted first, then the copy falls back to a
    /// versioned sidecar. Returns the path actually written.
    pub async fn integrate_artifact(
        &self,
        source: &Path,
        dest_dir: &Path,
        task_id: &str,
        resolver: Option<&dyn ConflictResolver>,
    ) -> DomainResult<PathBuf> {
        fs::create_dir_all(dest_dir)?;
        let filename = source
            .file_name()
            .ok_or_else(|| {
                DomainError::ExecutionFailed(format!(
                    "artifact source has no file name: {}",
                    source.display()
                ))
            })?
            .to_string_lossy()
            .into_owned();
        let original_dest = dest_dir.join(&filename);

        if original_dest.exists() {
            if let Some(resolver) = resolver {
                info!(task_id, file = %filename, "attempting 2-way merge");
                let resolution = resolver.resolve_two_way(&original_dest, source, task_id).await;
                match resolution.merged_path.as_deref() {
                    Some(merged_path) if resolution.strategy == ResolutionStrategy::Merged => {
                        copy_file(merged_path, &original_dest)?;
                        info!(task_id, file = %filename, message = %resolution.message, "merged artifact");
                        return Ok(original_dest);
                    }
                    _ => {
                        info!(task_id, file = %filename, message = %resolution.message, "merge failed");
                    }
                }
            }

            let versioned = versioned_path(&original_dest, task_id);
            copy_file(source, &versioned)?;
            warn!(
                task_id,
                file = %filename,
                versioned = %versioned.display(),
                "artifact conflict saved with version suffix"
            );
            return Ok(versioned);
        }

        copy_file(source, &original_dest)?;
        info!(task_id, file = %filename, "integrated artifact");
        Ok(original_dest)
    }

    // ------------------------------------------------------------------
    // Artifact registry
    // ------------------------------------------------------------------

    /// Walk a task's output directory, record an artifact per non-excluded
    /// file, and persist the registry.
    #[instrument(skip(self, task_dir), fields(task_dir = %task_dir.display()))]
    pub fn register_task_artifacts(
        &self,
        task_id: &str,
        task_name: &str,
        task_dir: &Path,
    ) -> DomainResult<TaskArtifacts> {
        let mut task_artifacts = TaskArtifacts::new(task_id, task_name);

        for (relative, metadata) in Self::snapshot(task_dir) {
            let filename = Path::new(&relative)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| relative.clone());
            debug!(task_id, file = %filename, "registered artifact");
            task_artifacts.add_artifact(Artifact {
                filename,
                path: relative,
                size: metadata.size,
                hash: metadata.hash,
                created_at: metadata.mtime,
                task_id: task_id.to_string(),
            });
        }

        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for artifact in &task_artifacts.artifacts {
            let producers = inner.file_index.entry(artifact.filename.clone()).or_default();
            if !producers.contains(&task_artifacts.task_id) {
                producers.push(task_artifacts.task_id.clone());
            }
        }
        inner
            .registry
            .insert(task_id.to_string(), task_artifacts.clone());
        self.save_registry(&inner)?;

        Ok(task_artifacts)
    }

    /// Artifacts recorded for a task, if any.
    pub fn task_artifacts(&self, task_id: &str) -> Option<TaskArtifacts> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .registry
            .get(task_id)
            .cloned()
    }

    /// Ids of every task that produced a file with this name.
    pub fn tasks_by_file(&self, filename: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .file_index
            .get(filename)
            .cloned()
            .unwrap_or_default()
    }

    /// Filenames produced by more than one task.
    pub fn detect_file_conflicts(&self) -> BTreeMap<String, Vec<String>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .file_index
            .iter()
            .filter(|(_, producers)| producers.len() > 1)
            .map(|(filename, producers)| (filename.clone(), producers.clone()))
            .collect()
    }

    /// Aggregate numbers over the registry.
    pub fn registry_summary(&self) -> RegistrySummary {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        RegistrySummary {
            total_tasks: inner.registry.len(),
            total_artifacts: inner.registry.values().map(|ta| ta.artifacts.len()).sum(),
            total_size: inner
                .registry
                .values()
                .flat_map(|ta| &ta.artifacts)
                .map(|artifact| artifact.size)
                .sum(),
            file_conflicts: inner
                .file_index
                .values()
                .filter(|producers| producers.len() > 1)
                .count(),
            unique_files: inner.file_index.len(),
        }
    }

    /// Persist the registry JSON: parent mkdir, temp file, atomic rename.
    fn save_registry(&self, inner: &Inner) -> DomainResult<()> {
        let Some(ref path) = self.registry_path else {
            return Ok(());
        };
        let document = RegistryDocument {
            registry: inner.registry.clone(),
            file_index: inner.file_index.clone(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_string_pretty(&document)?)?;
        fs::rename(&temp, path)?;
        debug!(path = %path.display(), "registry saved");
        Ok(())
    }

    fn load_registry(&self) -> DomainResult<()> {
        let Some(ref path) = self.registry_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let raw = fs::read_to_string(path)?;
        let mut document: RegistryDocument = serde_json::from_str(&raw)?;

        // The artifact back-reference is denormalized; the container key
        // is authoritative.
        for (task_id, task_artifacts) in &mut document.registry {
            task_artifacts.task_id.clone_from(task_id);
            for artifact in &mut task_artifacts.artifacts {
                artifact.task_id.clone_from(task_id);
            }
        }

        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.registry = document.registry;
        inner.file_index = document.file_index;
        info!(path = %path.display(), tasks = inner.registry.len(), "registry loaded");
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Filesystem helpers
// ----------------------------------------------------------------------

/// Whether a path component is in the excluded set.
fn is_excluded_component(name: &std::ffi::OsStr) -> bool {
    EXCLUDED_COMPONENTS
        .iter()
        .any(|excluded| name == std::ffi::OsStr::new(excluded))
}

/// Recursive snapshot walk. Read failures are logged and skipped; they do
/// not fail the snapshot.
fn walk_into_snapshot(directory: &Path, root: &Path, snapshot: &mut Snapshot) {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(path = %directory.display(), %error, "failed to read directory during snapshot");
            return;
        }
    };

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if is_excluded_component(&entry.file_name()) {
            continue;
        }
        if path.is_dir() {
            walk_into_snapshot(&path, root, snapshot);
        } else if path.is_file() {
            match file_metadata(&path) {
                Ok(metadata) => {
                    let relative = path
                        .strip_prefix(root)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .into_owned();
                    snapshot.insert(relative, metadata);
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to snapshot file");
                }
            }
        }
    }
}

fn file_metadata(path: &Path) -> std::io::Result<FileMetadata> {
    let stat = fs::metadata(path)?;
    let mtime: DateTime<Utc> = stat.modified()?.into();
    Ok(FileMetadata {
        hash: hash_file(path)?,
        size: stat.len(),
        mtime,
    })
}

/// First 16 hex characters of the SHA-256 of the file contents, streamed
/// in 4 KiB blocks.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; HASH_BLOCK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(HASH_PREFIX_LEN);
    Ok(digest)
}

/// Copy one file, carrying the source's modification time across.
fn copy_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::copy(source, destination)?;
    if let Ok(modified) = fs::metadata(source).and_then(|meta| meta.modified()) {
        if let Ok(file) = File::options().write(true).open(destination) {
            let _ = file.set_times(FileTimes::new().set_modified(modified));
        }
    }
    Ok(())
}

/// Copy a directory tree verbatim (excluded names included), preserving
/// file modification times.
fn copy_tree(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::create_dir_all(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            copy_file(&entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Sidecar path for a conflicting file: `<stem>_<task_id><suffix>` next to
/// the original.
fn versioned_path(destination: &Path, task_id: &str) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match destination.extension() {
        Some(extension) => format!("{stem}_{task_id}.{}", extension.to_string_lossy()),
        None => format!("{stem}_{task_id}"),
    };
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(hash: &str) -> FileMetadata {
        FileMetadata {
            hash: hash.to_string(),
            size: 1,
            mtime: Utc::now(),
        }
    }

    #[test]
    fn test_diff_classifies_changes() {
        let mut base = Snapshot::new();
        base.insert("kept.py".to_string(), meta("aaaa"));
        base.insert("changed.py".to_string(), meta("bbbb"));
        base.insert("removed.py".to_string(), meta("cccc"));

        let mut current = Snapshot::new();
        current.insert("kept.py".to_string(), meta("aaaa"));
        current.insert("changed.py".to_string(), meta("dddd"));
        current.insert("added.py".to_string(), meta("eeee"));

        let changes = WorkspaceService::diff(&base, &current);
        assert_eq!(changes.new, vec!["added.py"]);
        assert_eq!(changes.modified, vec!["changed.py"]);
        assert_eq!(changes.deleted, vec!["removed.py"]);
    }

    #[test]
    fn test_diff_reflexive() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("a.py".to_string(), meta("aaaa"));
        snapshot.insert("b.py".to_string(), meta("bbbb"));
        assert!(WorkspaceService::diff(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn test_versioned_path_with_extension() {
        let path = versioned_path(Path::new("/shared/conflict.py"), "task-002");
        assert_eq!(path, Path::new("/shared/conflict_task-002.py"));
    }

    #[test]
    fn test_versioned_path_without_extension() {
        let path = versioned_path(Path::new("/shared/Makefile"), "task-002");
        assert_eq!(path, Path::new("/shared/Makefile_task-002"));
    }

    #[test]
    fn test_hash_file_is_16_hex_chars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "hello world").unwrap();

        let digest = hash_file(&path).unwrap();
        assert_eq!(digest.len(), HASH_PREFIX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

        // Identical contents hash identically, regardless of path.
        let other = dir.path().join("copy.txt");
        fs::write(&other, "hello world").unwrap();
        assert_eq!(digest, hash_file(&other).unwrap());
    }

    #[test]
    fn test_snapshot_excludes_components() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kept.py"), "x").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/config"), "x").unwrap();
        fs::create_dir_all(dir.path().join(".claude")).unwrap();
        fs::write(dir.path().join(".claude/settings.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("pkg/__pycache__")).unwrap();
        fs::write(dir.path().join("pkg/__pycache__/mod.pyc"), "x").unwrap();
        fs::write(dir.path().join("pkg/mod.py"), "x").unwrap();

        let snapshot = WorkspaceService::snapshot(dir.path());
        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, vec!["kept.py", "pkg/mod.py"]);
    }

    #[test]
    fn test_snapshot_of_missing_directory_is_empty() {
        let snapshot = WorkspaceService::snapshot(Path::new("/nonexistent/tree"));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_copy_tree_preserves_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("nested/file.txt"), "content").unwrap();
        let source_mtime = fs::metadata(source.join("nested/file.txt"))
            .unwrap()
            .modified()
            .unwrap();

        let destination = dir.path().join("dst");
        copy_tree(&source, &destination).unwrap();

        let copied = destination.join("nested/file.txt");
        assert_eq!(fs::read_to_string(&copied).unwrap(), "content");
        let copied_mtime = fs::metadata(&copied).unwrap().modified().unwrap();
        let drift = copied_mtime
            .duration_since(source_mtime)
            .unwrap_or_else(|e| e.duration());
        assert!(drift < std::time::Duration::from_secs(1), "mtime drift: {drift:?}");
    }
}
