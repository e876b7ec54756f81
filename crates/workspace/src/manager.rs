// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace Manager (spec §4.4): Create/Clone/Open/Cleanup/Janitor.
//!
//! Path invariant: only the job-ID-shaped directory name is ever persisted
//! by callers (via `Job::workspace_id`); the absolute path is computed here
//! at runtime as `base_dir / id`, so the data directory is relocatable.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ductile_core::WorkspaceId;
use ductile_storage::Storage;

use crate::error::WorkspaceError;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn path_for(&self, id: WorkspaceId) -> PathBuf {
        self.base_dir.join(id.as_str())
    }

    /// `Create(job_id)` — mode 0700 (spec §4.4).
    pub fn create(&self, id: WorkspaceId) -> Result<PathBuf, WorkspaceError> {
        let path = self.path_for(id);
        std::fs::create_dir_all(&path)?;
        set_private_mode(&path)?;
        Ok(path)
    }

    /// `Open(job_id)` — errors if missing.
    pub fn open(&self, id: WorkspaceId) -> Result<PathBuf, WorkspaceError> {
        let path = self.path_for(id);
        if !path.is_dir() {
            return Err(WorkspaceError::NotFound(id.as_str().to_string()));
        }
        Ok(path)
    }

    /// `Clone(parent_job_id, child_job_id)` — hardlinks every regular file;
    /// recreates directories and symlinks. Never byte-copies (spec §4.4).
    /// On any I/O error the partial child workspace is removed.
    pub fn clone_workspace(
        &self,
        parent: WorkspaceId,
        child: WorkspaceId,
    ) -> Result<PathBuf, WorkspaceError> {
        let parent_path = self.open(parent)?;
        let child_path = self.path_for(child);

        match clone_tree(&parent_path, &child_path) {
            Ok(()) => {
                set_private_mode(&child_path)?;
                Ok(child_path)
            }
            Err(err) => {
                let _ = std::fs::remove_dir_all(&child_path);
                Err(err)
            }
        }
    }

    /// `Cleanup(job_id)` — removes the directory tree.
    pub fn cleanup(&self, id: WorkspaceId) -> Result<(), WorkspaceError> {
        let path = self.path_for(id);
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        }
        Ok(())
    }

    /// `Janitor()` — prune workspaces whose owning job is terminal and older
    /// than `retention` (spec §4.4, default 24h). Safe to run concurrently
    /// with dispatch: only prunes directories whose owning job_log row shows
    /// a `completed_at` past the window.
    pub fn run_janitor(
        &self,
        storage: &Storage,
        now: DateTime<Utc>,
        retention: chrono::Duration,
    ) -> Result<usize, WorkspaceError> {
        let mut pruned = 0;
        let Ok(entries) = std::fs::read_dir(&self.base_dir) else {
            return Ok(0);
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else { continue };
            if !file_type.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
            let job_id = ductile_core::JobId::from_string(&name);
            let Ok(Some(log_entry)) = storage.find_job_log(job_id) else { continue };
            if now - log_entry.completed_at >= retention {
                let path = entry.path();
                if std::fs::remove_dir_all(&path).is_ok() {
                    pruned += 1;
                    tracing::info!(job_id = %name, "janitor pruned workspace");
                }
            }
        }
        Ok(pruned)
    }
}

fn clone_tree(src: &Path, dst: &Path) -> Result<(), WorkspaceError> {
    std::fs::create_dir_all(dst)?;
    set_private_mode(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            clone_tree(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(&src_path)?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&target, &dst_path)?;
            #[cfg(not(unix))]
            let _ = target;
        } else {
            std::fs::hard_link(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_private_mode(path: &Path) -> std::io::Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_private_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
