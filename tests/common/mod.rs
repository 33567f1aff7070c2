//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Write a WBS document to `dir/wbs.yaml` and return its path.
pub fn write_wbs(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("wbs.yaml");
    fs::write(&path, yaml).expect("failed to write WBS fixture");
    path
}

/// Write an executable stub script standing in for the agent binary.
///
/// The orchestrator invokes it as `<agent> --print <prompt>` with the
/// sandbox as working directory, so `$2` is the prompt and files written
/// to the current directory land in the sandbox.
#[cfg(unix)]
pub fn write_stub_agent(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write stub agent");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("failed to chmod stub agent");
    path
}
