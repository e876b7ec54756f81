// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin spawn contract (spec §4.5): envelope in on stdin, envelope out
//! on stdout, deadline enforced with SIGTERM→grace→SIGKILL on the process
//! group.

use std::process::Stdio;
use std::time::Duration;

use ductile_storage::job_log::{cap_bytes, STDERR_CAP_BYTES, STDOUT_CAP_BYTES};
use ductile_wire::{RequestEnvelope, ResponseEnvelope, EXIT_CODE_NON_RETRYABLE_CONFIG};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::PluginError;
use crate::registry::RegisteredPlugin;

/// Grace period between SIGTERM and SIGKILL on deadline expiry (spec §4.5).
const KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub response: Option<ResponseEnvelope>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutcome {
    /// Whether the invocation should be retried per spec §4.5 item 7.
    pub fn retryable(&self) -> bool {
        if self.timed_out {
            return true;
        }
        if self.exit_code == Some(EXIT_CODE_NON_RETRYABLE_CONFIG) {
            return false;
        }
        match &self.response {
            Some(r) => r.retry,
            // Non-JSON stdout or a schema mismatch is a plugin protocol
            // violation (spec §7), not a transient failure: fail, don't retry.
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct PluginRunner;

impl PluginRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute one plugin invocation end to end (spec §4.5 items 2-7).
    pub async fn run(
        &self,
        plugin: &RegisteredPlugin,
        request: &RequestEnvelope,
        deadline: Duration,
        env_passthrough: &[String],
    ) -> Result<RunOutcome, PluginError> {
        let payload =
            serde_json::to_vec(request).map_err(|e| PluginError::Protocol {
                plugin: plugin.manifest.name.clone(),
                reason: format!("failed to serialize request envelope: {e}"),
            })?;

        let mut cmd = Command::new(&plugin.entrypoint);
        cmd.current_dir(&plugin.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear();
        for key in env_passthrough {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
        place_in_own_process_group(&mut cmd);

        let mut child = cmd.spawn()?;
        let pid = child.id().ok_or_else(|| PluginError::Io(std::io::Error::other(
            "child exited before its pid could be observed",
        )))?;

        let mut stdin = child.stdin.take().expect("stdin piped");
        stdin.write_all(&payload).await?;
        drop(stdin);

        let mut stdout_pipe = child.stdout.take().expect("stdout piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr piped");
        let stdout_task =
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stdout_pipe.read_to_end(&mut buf).await;
                buf
            });
        let stderr_task =
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr_pipe.read_to_end(&mut buf).await;
                buf
            });

        let (exit_status, timed_out) = match tokio::time::timeout(deadline, child.wait()).await {
            Ok(result) => (result?, false),
            Err(_elapsed) => {
                tracing::warn!(
                    plugin = %plugin.manifest.name,
                    pid,
                    "plugin exceeded its deadline, sending SIGTERM to process group"
                );
                let _ = kill(Pid::from_raw(-(pid as i32)), Signal::SIGTERM);
                let status = match tokio::time::timeout(KILL_GRACE, child.wait()).await {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::warn!(
                            plugin = %plugin.manifest.name,
                            pid,
                            "plugin ignored SIGTERM, sending SIGKILL"
                        );
                        let _ = kill(Pid::from_raw(-(pid as i32)), Signal::SIGKILL);
                        child.wait().await?
                    }
                };
                (status, true)
            }
        };

        let stdout = cap_bytes(stdout_task.await.unwrap_or_default(), STDOUT_CAP_BYTES);
        let stderr = cap_bytes(stderr_task.await.unwrap_or_default(), STDERR_CAP_BYTES);
        let exit_code = exit_status.code();

        if timed_out {
            return Ok(RunOutcome { response: None, exit_code, timed_out: true, stdout, stderr });
        }

        let response = match serde_json::from_slice::<ResponseEnvelope>(&stdout) {
            Ok(response) => Some(response),
            Err(err) => {
                tracing::error!(
                    plugin = %plugin.manifest.name,
                    error = %err,
                    "plugin response failed to parse as a response envelope"
                );
                None
            }
        };

        Ok(RunOutcome { response, exit_code, timed_out: false, stdout, stderr })
    }
}

#[cfg(unix)]
fn place_in_own_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn place_in_own_process_group(_cmd: &mut Command) {}
