// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin manifest schema (spec §6) parsed from `manifest.yaml`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCommand {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CommandKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigKeys {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub protocol: u32,
    pub entrypoint: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub commands: Vec<ManifestCommand>,
    #[serde(default)]
    pub config_keys: ConfigKeys,
    #[serde(default)]
    pub env_refs: Vec<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub every: String,
    #[serde(default)]
    pub preferred_window: Option<PreferredWindow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredWindow {
    /// "HH:MM" 24-hour local start of the window.
    pub start: String,
    /// "HH:MM" 24-hour local end of the window.
    pub end: String,
}

impl PluginManifest {
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Default command classification (spec §4.5): `health` is read, all else write.
    pub fn classify(&self, command: &str) -> CommandKind {
        self.commands
            .iter()
            .find(|c| c.name == command)
            .map(|c| c.kind)
            .unwrap_or(if command == "health" { CommandKind::Read } else { CommandKind::Write })
    }
}
