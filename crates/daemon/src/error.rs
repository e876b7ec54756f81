// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("another ductiled instance holds the lock at {0}")]
    LockFailed(PathBuf),

    #[error("no state directory: set DUCTILE_STATE_DIR or HOME")]
    NoStateDir,

    #[error("malformed config at {path}: {source}")]
    ConfigParse { path: PathBuf, #[source] source: toml::de::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] ductile_storage::StorageError),

    #[error(transparent)]
    Workspace(#[from] ductile_workspace::WorkspaceError),

    #[error(transparent)]
    Plugin(#[from] ductile_plugins::PluginError),

    #[error(transparent)]
    Pipeline(#[from] ductile_pipelines::PipelineError),

    #[error(transparent)]
    Scheduler(#[from] ductile_scheduler::SchedulerError),
}
