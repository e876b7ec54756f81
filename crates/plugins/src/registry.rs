// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin discovery and registration (spec §4.5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ductile_wire::{CommandKind, PluginManifest};

use crate::error::PluginError;

/// Highest request-envelope protocol version this runner speaks.
const SUPPORTED_PROTOCOLS: &[u32] = &[1, 2];

#[derive(Debug, Clone)]
pub struct RegisteredPlugin {
    pub manifest: PluginManifest,
    pub dir: PathBuf,
    pub entrypoint: PathBuf,
}

impl RegisteredPlugin {
    pub fn classify(&self, command: &str) -> CommandKind {
        self.manifest.classify(command)
    }
}

/// In-memory, read-mostly registry built once at startup (spec §5: "built at
/// startup, swapped atomically on reload").
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    /// Walk each root in order; earlier roots win on name collision (WARN).
    pub fn discover(roots: &[PathBuf]) -> Self {
        let mut plugins = HashMap::new();
        for root in roots {
            let Ok(entries) = std::fs::read_dir(root) else {
                tracing::error!(root = %root.display(), "plugin root unreadable");
                continue;
            };
            for entry in entries.flatten() {
                let Ok(file_type) = entry.file_type() else { continue };
                if !file_type.is_dir() {
                    continue;
                }
                let dir = entry.path();
                match load_plugin(root, &dir) {
                    Ok(plugin) => {
                        if let Some(existing) = plugins.get(&plugin.manifest.name) {
                            tracing::warn!(
                                plugin = %plugin.manifest.name,
                                kept_dir = %existing.dir.display(),
                                shadowed_dir = %dir.display(),
                                "duplicate plugin name, earlier root wins"
                            );
                        } else {
                            plugins.insert(plugin.manifest.name.clone(), plugin);
                        }
                    }
                    Err(PluginSkip::NoManifest) => {}
                    Err(PluginSkip::Rejected(err)) => {
                        tracing::error!(dir = %dir.display(), error = %err, "plugin rejected");
                    }
                }
            }
        }
        Self { plugins }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredPlugin> {
        self.plugins.get(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPlugin> {
        self.plugins.values()
    }
}

enum PluginSkip {
    NoManifest,
    Rejected(PluginError),
}

fn load_plugin(root: &Path, dir: &Path) -> Result<RegisteredPlugin, PluginSkip> {
    let manifest_path = dir.join("manifest.yaml");
    if !manifest_path.is_file() {
        return Err(PluginSkip::NoManifest);
    }
    let yaml = std::fs::read_to_string(&manifest_path)
        .map_err(|e| PluginSkip::Rejected(PluginError::Io(e)))?;
    let manifest = PluginManifest::parse(&yaml).map_err(|source| {
        PluginSkip::Rejected(PluginError::ManifestParse { path: manifest_path.clone(), source })
    })?;

    if !SUPPORTED_PROTOCOLS.contains(&manifest.protocol) {
        return Err(reject(&manifest.name, format!("unsupported protocol {}", manifest.protocol)));
    }
    if manifest.entrypoint.contains("..") {
        return Err(reject(&manifest.name, "entrypoint contains '..'".to_string()));
    }

    let entrypoint = dir.join(&manifest.entrypoint);
    let canonical_entrypoint = entrypoint
        .canonicalize()
        .map_err(|e| reject(&manifest.name, format!("entrypoint does not resolve: {e}")))?;
    let canonical_dir = dir
        .canonicalize()
        .map_err(|e| reject(&manifest.name, format!("plugin dir does not resolve: {e}")))?;
    let canonical_root = root
        .canonicalize()
        .map_err(|e| reject(&manifest.name, format!("plugin root does not resolve: {e}")))?;

    if !canonical_entrypoint.starts_with(&canonical_dir) {
        return Err(reject(&manifest.name, "entrypoint escapes its own plugin directory".to_string()));
    }
    if !canonical_dir.starts_with(&canonical_root) {
        return Err(reject(&manifest.name, "plugin directory escapes its root".to_string()));
    }
    if !is_executable(&canonical_entrypoint) {
        return Err(reject(&manifest.name, "entrypoint is not executable".to_string()));
    }
    if is_world_writable(&canonical_dir) {
        return Err(reject(&manifest.name, "plugin directory is world-writable".to_string()));
    }

    Ok(RegisteredPlugin { manifest, dir: canonical_dir, entrypoint: canonical_entrypoint })
}

fn reject(name: &str, reason: String) -> PluginSkip {
    PluginSkip::Rejected(PluginError::Rejected { name: name.to_string(), reason })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(unix)]
fn is_world_writable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map(|m| m.permissions().mode() & 0o002 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_world_writable(_path: &Path) -> bool {
    false
}
