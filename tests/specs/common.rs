// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario tests (spec §8).

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Write a single-file plugin with the given shell script as its entrypoint.
/// Mirrors the fixture shape used across the workspace's own unit tests.
pub fn write_plugin(root: &Path, name: &str, script: &str) {
    write_plugin_with_schedule(root, name, None, script);
}

pub fn write_plugin_with_schedule(root: &Path, name: &str, schedule_every: Option<&str>, script: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    let schedule_block = match schedule_every {
        Some(every) => format!("schedule:\n  every: \"{every}\"\n"),
        None => String::new(),
    };
    std::fs::write(
        dir.join("manifest.yaml"),
        format!("name: {name}\nversion: \"1.0.0\"\nprotocol: 2\nentrypoint: \"./run.sh\"\n{schedule_block}"),
    )
    .unwrap();
    let path = dir.join("run.sh");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
