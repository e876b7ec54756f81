// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin {0} not found in registry")]
    UnknownPlugin(String),

    #[error("plugin manifest at {path}: {source}")]
    ManifestParse { path: std::path::PathBuf, source: serde_yaml::Error },

    #[error("plugin {name} rejected: {reason}")]
    Rejected { name: String, reason: String },

    #[error("plugin {plugin} produced malformed response: {reason}")]
    Protocol { plugin: String, reason: String },

    #[error("plugin {plugin} exceeded its {command} deadline")]
    DeadlineExceeded { plugin: String, command: String },

    #[error("io error spawning plugin: {0}")]
    Io(#[from] std::io::Error),
}
