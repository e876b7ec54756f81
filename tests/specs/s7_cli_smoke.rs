// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S7 — CLI black-box smoke test: `ductile` reads an on-disk state
//! directory without a running daemon and exits cleanly against both an
//! empty directory and one with a registered plugin.

use assert_cmd::Command;

use crate::common::write_plugin;

fn run_ductile(state_dir: &std::path::Path, args: &[&str]) -> String {
    let output = Command::cargo_bin("ductile")
        .unwrap()
        .env("DUCTILE_STATE_DIR", state_dir)
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn status_on_an_empty_state_dir_reports_not_running() {
    let state_dir = tempfile::tempdir().unwrap();
    let stdout = run_ductile(state_dir.path(), &["--format", "json", "status"]);
    assert!(stdout.contains("\"running\": false"));
}

#[test]
fn job_list_on_an_empty_state_dir_reports_no_jobs() {
    let state_dir = tempfile::tempdir().unwrap();
    let stdout = run_ductile(state_dir.path(), &["job", "list"]);
    assert!(stdout.contains("no jobs"));
}

#[test]
fn pipeline_list_sees_plugins_discovered_under_state_dir() {
    let state_dir = tempfile::tempdir().unwrap();
    write_plugin(
        &state_dir.path().join("plugins"),
        "echo",
        "#!/bin/sh\ncat > /dev/null\necho '{\"status\":\"ok\"}'\n",
    );
    let stdout = run_ductile(state_dir.path(), &["--format", "json", "status"]);
    assert!(stdout.contains("\"plugin_count\": 1"));
}
