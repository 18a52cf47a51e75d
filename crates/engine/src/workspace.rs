// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace management.
//!
//! Each step owns `<workspace_root>/<run_id>/<step_id>/` for the duration
//! of its execution; retries get fresh `retry-<n>` directories beneath
//! the step directory. Mounts are filtered recursive copies from the
//! project root; consumers receive artifact copies, never links.

use crate::error::EngineError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use wave_manifest::{interpolate, MountDef, MountMode};
use wave_security::{validate_path, PathPolicy};

/// Per-file size cap for mount copies (10 MiB).
pub const MAX_MOUNT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Ecosystem cache/build directories never copied into a workspace.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".cache",
    ".next",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
];

/// Creates, populates, and removes per-step workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one step attempt. Attempt 0 is the step directory
    /// itself; retries live beneath it.
    pub fn step_dir(&self, run_id: &str, step_id: &str, attempt: u32) -> PathBuf {
        let base = self.root.join(run_id).join(step_id);
        if attempt == 0 {
            base
        } else {
            base.join(format!("retry-{attempt}"))
        }
    }

    /// Create a step workspace and materialize its mounts.
    ///
    /// A missing mount source is fatal; files over the size cap are
    /// skipped with a warning and copying continues.
    pub fn create(
        &self,
        run_id: &str,
        step_id: &str,
        attempt: u32,
        mounts: &[MountDef],
        template_vars: &HashMap<String, String>,
        project_root: &Path,
    ) -> Result<PathBuf, EngineError> {
        let workspace = self.step_dir(run_id, step_id, attempt);
        fs::create_dir_all(&workspace)
            .map_err(|e| EngineError::Workspace(format!("create {}: {e}", workspace.display())))?;

        for mount in mounts {
            let source_text = interpolate(&mount.source, template_vars);
            let source = validate_path(
                &source_text,
                project_root,
                &PathPolicy::new().with_root(project_root),
            )?;
            if !source.exists() {
                return Err(EngineError::Workspace(format!(
                    "mount source {} does not exist",
                    source.display()
                )));
            }

            let target = workspace.join(&mount.target);
            let copied = copy_filtered(&source, &target)?;
            apply_mode(&target, mount.mode)?;

            tracing::debug!(
                source = %source.display(),
                target = %target.display(),
                files = copied,
                mode = ?mount.mode,
                "mount materialized"
            );
        }

        Ok(workspace)
    }

    /// Copy injected artifacts into `<workspace>/artifacts/<step>_<name>`.
    ///
    /// `items` carries (producing step id, injected name, resolved source
    /// path) triples; sources were registered by completed producers.
    pub fn inject_artifacts(
        &self,
        workspace: &Path,
        items: &[(String, String, PathBuf)],
    ) -> Result<(), EngineError> {
        if items.is_empty() {
            return Ok(());
        }
        let artifacts_dir = workspace.join("artifacts");
        fs::create_dir_all(&artifacts_dir)
            .map_err(|e| EngineError::Workspace(format!("create artifacts dir: {e}")))?;

        for (producer, name, source) in items {
            if !source.exists() {
                return Err(EngineError::Workspace(format!(
                    "artifact {name} from {producer} missing at {}",
                    source.display()
                )));
            }
            let target = artifacts_dir.join(format!("{producer}_{name}"));
            if source.is_dir() {
                copy_filtered(source, &target)?;
            } else {
                fs::copy(source, &target).map_err(|e| {
                    EngineError::Workspace(format!("inject {}: {e}", source.display()))
                })?;
            }
        }
        Ok(())
    }

    /// Remove one run's workspaces, chmodding read-only trees back up.
    pub fn clean_run(&self, run_id: &str) -> Result<(), EngineError> {
        let dir = self.root.join(run_id);
        if !dir.exists() {
            return Ok(());
        }
        make_writable(&dir);
        fs::remove_dir_all(&dir)
            .map_err(|e| EngineError::Workspace(format!("remove {}: {e}", dir.display())))
    }

    /// Remove every workspace under the root.
    pub fn clean_all(&self) -> Result<(), EngineError> {
        if !self.root.exists() {
            return Ok(());
        }
        make_writable(&self.root);
        fs::remove_dir_all(&self.root)
            .map_err(|e| EngineError::Workspace(format!("remove {}: {e}", self.root.display())))
    }

    /// Total bytes under one run's workspaces.
    pub fn run_size_bytes(&self, run_id: &str) -> u64 {
        dir_size(&self.root.join(run_id))
    }
}

/// Recursive copy with the skip-list and size cap. Symlinks are not
/// followed. Returns the number of files copied.
fn copy_filtered(source: &Path, target: &Path) -> Result<usize, EngineError> {
    let meta = fs::symlink_metadata(source)
        .map_err(|e| EngineError::Workspace(format!("stat {}: {e}", source.display())))?;

    if meta.file_type().is_symlink() {
        tracing::debug!(path = %source.display(), "skipping symlink");
        return Ok(0);
    }

    if meta.is_file() {
        if meta.len() > MAX_MOUNT_FILE_SIZE {
            tracing::warn!(
                path = %source.display(),
                size = meta.len(),
                cap = MAX_MOUNT_FILE_SIZE,
                "file exceeds size cap, skipped"
            );
            return Ok(0);
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::Workspace(format!("create {}: {e}", parent.display())))?;
        }
        fs::copy(source, target)
            .map_err(|e| EngineError::Workspace(format!("copy {}: {e}", source.display())))?;
        return Ok(1);
    }

    // Directory
    fs::create_dir_all(target)
        .map_err(|e| EngineError::Workspace(format!("create {}: {e}", target.display())))?;
    let mut copied = 0;
    let entries = fs::read_dir(source)
        .map_err(|e| EngineError::Workspace(format!("read {}: {e}", source.display())))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| EngineError::Workspace(format!("read {}: {e}", source.display())))?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if SKIP_DIRS.contains(&name_str.as_ref()) {
            continue;
        }
        copied += copy_filtered(&entry.path(), &target.join(&name))?;
    }
    Ok(copied)
}

/// Best-effort mode bits: readonly 0555/0444, readwrite 0755/0644.
fn apply_mode(path: &Path, mode: MountMode) -> Result<(), EngineError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let (dir_bits, file_bits) = match mode {
            MountMode::Readonly => (0o555, 0o444),
            MountMode::Readwrite => (0o755, 0o644),
        };
        walk(path, &mut |entry: &Path, is_dir: bool| {
            let bits = if is_dir { dir_bits } else { file_bits };
            if let Err(e) = fs::set_permissions(entry, fs::Permissions::from_mode(bits)) {
                tracing::debug!(path = %entry.display(), error = %e, "chmod failed");
            }
        });
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Restore write permission so removal can proceed.
fn make_writable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        walk(path, &mut |entry: &Path, is_dir: bool| {
            let bits = if is_dir { 0o755 } else { 0o644 };
            if let Err(e) = fs::set_permissions(entry, fs::Permissions::from_mode(bits)) {
                tracing::debug!(path = %entry.display(), error = %e, "chmod-up failed");
            }
        });
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Depth-first walk; directories are visited before their children so a
/// chmod-up can descend into previously read-only trees.
fn walk(path: &Path, visit: &mut dyn FnMut(&Path, bool)) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.is_dir() {
        visit(path, true);
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                walk(&entry.path(), visit);
            }
        }
    } else {
        visit(path, false);
    }
}

fn dir_size(path: &Path) -> u64 {
    let mut total = 0;
    walk(path, &mut |entry, is_dir| {
        if !is_dir {
            if let Ok(meta) = fs::symlink_metadata(entry) {
                total += meta.len();
            }
        }
    });
    total
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
