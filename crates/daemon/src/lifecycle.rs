// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: acquire the PID lock, open storage, discover plugins and
//! pipelines, and hand back everything the tick loop needs.

use std::path::Path;

use fs2::FileExt;
use ductile_plugins::PluginRegistry;
use ductile_pipelines::dag::PipelineSet;
use ductile_storage::Storage;
use ductile_wire::PipelineManifest;
use ductile_workspace::WorkspaceManager;

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::hub::EventHub;

/// Held for the lifetime of the process; dropping it (or process exit)
/// releases the advisory lock so the next `ductiled` can start.
pub struct PidLock {
    _file: std::fs::File,
}

fn acquire_pid_lock(lock_path: &Path) -> Result<PidLock, DaemonError> {
    use std::io::Write;

    let file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(lock_path)?;
    file.try_lock_exclusive().map_err(|_| DaemonError::LockFailed(lock_path.to_path_buf()))?;

    let mut file = file;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(PidLock { _file: file })
}

/// Parse every `*.yaml`/`*.yml` pipeline manifest in `dir`. A missing
/// directory is not an error — a fresh install has no pipelines yet.
pub fn load_pipeline_manifests(dir: &Path) -> Result<Vec<PipelineManifest>, DaemonError> {
    let mut manifests = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Ok(manifests);
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
        if !is_yaml {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        match PipelineManifest::parse(&raw) {
            Ok(manifest) => manifests.push(manifest),
            Err(err) => tracing::error!(path = %path.display(), error = %err, "malformed pipeline manifest"),
        }
    }
    Ok(manifests)
}

/// Everything wired up and ready for the tick loop in `main`.
pub struct Daemon {
    pub config: DaemonConfig,
    pub storage: Storage,
    pub workspaces: WorkspaceManager,
    pub registry: PluginRegistry,
    pub pipelines: PipelineSet,
    pub hub: EventHub,
    pub _lock: PidLock,
}

impl Daemon {
    /// Acquire the lock, create the fixed directory layout, open storage,
    /// and discover plugins and pipelines. Order matters: the lock is taken
    /// before anything else so two instances never race on the same
    /// state directory.
    pub async fn startup(config: DaemonConfig) -> Result<Self, DaemonError> {
        std::fs::create_dir_all(&config.state_dir)?;
        let lock = acquire_pid_lock(&config.lock_path)?;

        std::fs::create_dir_all(&config.workspaces_dir)?;
        std::fs::create_dir_all(&config.log_dir)?;
        std::fs::create_dir_all(&config.pipeline_dir)?;
        for root in &config.plugin_roots {
            std::fs::create_dir_all(root)?;
        }

        let storage = Storage::open(&config.db_path)?;
        let workspaces = WorkspaceManager::new(&config.workspaces_dir);
        let registry = PluginRegistry::discover(&config.plugin_roots);
        tracing::info!(count = registry.len(), "discovered plugins");

        let pipeline_manifests = load_pipeline_manifests(&config.pipeline_dir)?;
        let pipelines = PipelineSet::compile(&pipeline_manifests, &registry)?;
        tracing::info!(count = pipelines.len(), "compiled pipelines");

        Ok(Self {
            config,
            storage,
            workspaces,
            registry,
            pipelines,
            hub: EventHub::new(),
            _lock: lock,
        })
    }

    /// Plugin manifests with a schedule, for the scheduler's per-tick pass.
    pub fn scheduled_manifests(&self) -> Vec<ductile_wire::PluginManifest> {
        self.registry.iter().map(|p| p.manifest.clone()).filter(|m| m.schedule.is_some()).collect()
    }
}
