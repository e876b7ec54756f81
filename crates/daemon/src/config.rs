// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: fixed on-disk layout plus the `ductile.toml` knobs
//! that aren't invariants (deadlines, tick interval, plugin roots).

use std::path::PathBuf;
use std::time::Duration;

use ductile_core::JobCommand;
use serde::Deserialize;

use crate::error::DaemonError;

/// Resolve the state directory: `DUCTILE_STATE_DIR` > `XDG_STATE_HOME`/ductile
/// > `~/.local/state/ductile`.
pub fn state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("DUCTILE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = dirs::state_dir() {
        return Ok(dir.join("ductile"));
    }
    let home = dirs::home_dir().ok_or(DaemonError::NoStateDir)?;
    Ok(home.join(".local/state/ductile"))
}

/// Per-command deadlines (spec §4.5 item 5): 60s/120s/10s/30s defaults,
/// overridable via `ductile.toml`'s `[timeouts]` table (spec §8 S4:
/// `timeouts.poll=2s`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub poll: Duration,
    pub handle: Duration,
    pub health: Duration,
    pub init: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(60),
            handle: Duration::from_secs(120),
            health: Duration::from_secs(10),
            init: Duration::from_secs(30),
        }
    }
}

impl Deadlines {
    pub fn for_command(&self, command: JobCommand) -> Duration {
        match command {
            JobCommand::Poll => self.poll,
            JobCommand::Handle => self.handle,
            JobCommand::Health => self.health,
            JobCommand::Init => self.init,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TimeoutsToml {
    poll: Option<String>,
    handle: Option<String>,
    health: Option<String>,
    init: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigToml {
    #[serde(default)]
    plugin_roots: Vec<PathBuf>,
    #[serde(default)]
    pipeline_dir: Option<PathBuf>,
    #[serde(default)]
    tick_interval_secs: Option<u64>,
    #[serde(default)]
    max_outstanding_polls: Option<u32>,
    #[serde(default)]
    job_log_retention_days: Option<i64>,
    #[serde(default)]
    env_passthrough: Vec<String>,
    #[serde(default)]
    timeouts: TimeoutsToml,
}

/// Daemon-wide runtime knobs (spec §4.6, §4.7), layered over a fixed
/// on-disk layout under `state_dir`.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub workspaces_dir: PathBuf,
    pub lock_path: PathBuf,
    pub log_dir: PathBuf,
    pub plugin_roots: Vec<PathBuf>,
    pub pipeline_dir: PathBuf,
    pub tick_interval: Duration,
    pub max_outstanding_polls: u32,
    pub job_log_retention: chrono::Duration,
    pub env_passthrough: Vec<String>,
    pub deadlines: Deadlines,
}

impl DaemonConfig {
    /// Fixed layout rooted at `state_dir`, overlaid with `ductile.toml` if
    /// present (spec's ambient config surface; absence is not an error).
    pub fn load(state_dir: PathBuf) -> Result<Self, DaemonError> {
        let toml_path = state_dir.join("ductile.toml");
        let overlay: ConfigToml = match std::fs::read_to_string(&toml_path) {
            Ok(raw) => toml::from_str(&raw)
                .map_err(|source| DaemonError::ConfigParse { path: toml_path.clone(), source })?,
            Err(_) => ConfigToml::default(),
        };

        let mut deadlines = Deadlines::default();
        if let Some(s) = &overlay.timeouts.poll {
            deadlines.poll = parse_duration(s);
        }
        if let Some(s) = &overlay.timeouts.handle {
            deadlines.handle = parse_duration(s);
        }
        if let Some(s) = &overlay.timeouts.health {
            deadlines.health = parse_duration(s);
        }
        if let Some(s) = &overlay.timeouts.init {
            deadlines.init = parse_duration(s);
        }

        let plugin_roots = if overlay.plugin_roots.is_empty() {
            vec![state_dir.join("plugins")]
        } else {
            overlay.plugin_roots
        };

        Ok(Self {
            db_path: state_dir.join("ductile.sqlite3"),
            workspaces_dir: state_dir.join("workspaces"),
            lock_path: state_dir.join("ductiled.pid"),
            log_dir: state_dir.join("logs"),
            pipeline_dir: overlay.pipeline_dir.unwrap_or_else(|| state_dir.join("pipelines")),
            tick_interval: Duration::from_secs(overlay.tick_interval_secs.unwrap_or(60)),
            max_outstanding_polls: overlay.max_outstanding_polls.unwrap_or(1),
            job_log_retention: chrono::Duration::days(overlay.job_log_retention_days.unwrap_or(30)),
            env_passthrough: overlay.env_passthrough,
            deadlines,
            plugin_roots,
            state_dir,
        })
    }
}

/// Parse a `"2s"` / `"500ms"` style duration. Falls back to whole seconds if
/// the value parses as a bare integer.
fn parse_duration(s: &str) -> Duration {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        if let Ok(n) = ms.trim().parse::<u64>() {
            return Duration::from_millis(n);
        }
    }
    if let Some(secs) = s.strip_suffix('s') {
        if let Ok(n) = secs.trim().parse::<u64>() {
            return Duration::from_secs(n);
        }
    }
    s.parse::<u64>().map(Duration::from_secs).unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_are_spec_durations() {
        let d = Deadlines::default();
        assert_eq!(d.poll, Duration::from_secs(60));
        assert_eq!(d.handle, Duration::from_secs(120));
        assert_eq!(d.health, Duration::from_secs(10));
        assert_eq!(d.init, Duration::from_secs(30));
    }

    #[test]
    fn load_without_a_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.max_outstanding_polls, 1);
    }

    #[test]
    fn load_overlays_timeouts_from_ductile_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ductile.toml"), "[timeouts]\npoll = \"2s\"\n").unwrap();
        let config = DaemonConfig::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.deadlines.poll, Duration::from_secs(2));
        assert_eq!(config.deadlines.handle, Duration::from_secs(120));
    }

    #[test]
    fn parse_duration_accepts_milliseconds_and_seconds() {
        assert_eq!(parse_duration("500ms"), Duration::from_millis(500));
        assert_eq!(parse_duration("2s"), Duration::from_secs(2));
        assert_eq!(parse_duration("7"), Duration::from_secs(7));
    }

    #[yare::parameterized(
        millis          = { "500ms", Duration::from_millis(500) },
        seconds_suffix  = { "2s", Duration::from_secs(2) },
        bare_integer    = { "7", Duration::from_secs(7) },
        padded          = { " 3s ", Duration::from_secs(3) },
        garbage         = { "banana", Duration::from_secs(60) },
    )]
    fn parse_duration_cases(input: &str, expected: Duration) {
        assert_eq!(parse_duration(input), expected);
    }

    proptest! {
        /// Invariant: `for_command` always routes to the deadline field
        /// matching its own command, for any overridden deadline set.
        #[test]
        fn for_command_routes_to_the_matching_deadline(
            poll_secs in 1u64..120,
            handle_secs in 1u64..240,
            health_secs in 1u64..30,
            init_secs in 1u64..60,
        ) {
            let deadlines = Deadlines {
                poll: Duration::from_secs(poll_secs),
                handle: Duration::from_secs(handle_secs),
                health: Duration::from_secs(health_secs),
                init: Duration::from_secs(init_secs),
            };
            prop_assert_eq!(deadlines.for_command(JobCommand::Poll), deadlines.poll);
            prop_assert_eq!(deadlines.for_command(JobCommand::Handle), deadlines.handle);
            prop_assert_eq!(deadlines.for_command(JobCommand::Health), deadlines.health);
            prop_assert_eq!(deadlines.for_command(JobCommand::Init), deadlines.init);
        }
    }
}
