// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The append-only job log (spec §3) and its age-based pruning.

use chrono::{DateTime, Utc};
use ductile_core::{JobCommand, JobId, JobOrigin, JobStatus};
use rusqlite::{params, Row};

use crate::connection::Storage;
use crate::error::Result;

/// Stdout capture cap (spec §4.5, §6).
pub const STDOUT_CAP_BYTES: usize = 10 * 1024 * 1024;
/// Stderr capture cap (spec §4.5, §6).
pub const STDERR_CAP_BYTES: usize = 64 * 1024;

/// Default job-log retention window (spec §3).
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct JobLogEntry {
    pub id: JobId,
    pub plugin: String,
    pub command: JobCommand,
    pub status: JobStatus,
    pub attempt: u32,
    pub origin: JobOrigin,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub stderr: Option<Vec<u8>>,
    pub stdout: Option<Vec<u8>>,
    pub parent_job_id: Option<JobId>,
    pub source_event_id: Option<uuid::Uuid>,
    pub dedupe_key: Option<String>,
}

impl JobLogEntry {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: JobId::from_string(row.get::<_, String>("id")?),
            plugin: row.get("plugin")?,
            command: crate::queue::parse_command(&row.get::<_, String>("command")?),
            status: crate::queue::parse_status(&row.get::<_, String>("status")?),
            attempt: row.get::<_, i64>("attempt")? as u32,
            origin: crate::queue::parse_origin(&row.get::<_, String>("origin")?),
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            last_error: row.get("last_error")?,
            stderr: row.get("stderr")?,
            stdout: row.get("stdout")?,
            parent_job_id: row.get::<_, Option<String>>("parent_job_id")?.map(JobId::from_string),
            source_event_id: row
                .get::<_, Option<String>>("source_event_id")?
                .and_then(|s| uuid::Uuid::parse_str(&s).ok()),
            dedupe_key: row.get("dedupe_key")?,
        })
    }
}

/// Truncate a captured stream to its cap per spec §4.5.
pub fn cap_bytes(mut data: Vec<u8>, cap: usize) -> Vec<u8> {
    data.truncate(cap);
    data
}

impl Storage {
    /// Prune job_log rows whose completion age exceeds the retention window
    /// (spec §3, invoked from the scheduler's janitor pass per §4.6).
    pub fn prune_job_log(&self, now: DateTime<Utc>, retention: chrono::Duration) -> Result<usize> {
        self.with_conn(|conn| {
            let cutoff = now - retention;
            let pruned =
                conn.execute("DELETE FROM job_log WHERE completed_at < ?1", params![cutoff])?;
            if pruned > 0 {
                tracing::info!(pruned, "pruned aged job_log rows");
            }
            Ok(pruned)
        })
    }

    /// Most recently completed jobs, newest first. Used by the operational
    /// CLI's `job list`; optionally narrowed to a single plugin.
    pub fn list_recent_job_log(
        &self,
        plugin: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JobLogEntry>> {
        self.with_conn(|conn| {
            let mut stmt = match plugin {
                Some(_) => conn.prepare(
                    "SELECT * FROM job_log WHERE plugin = ?1 ORDER BY completed_at DESC LIMIT ?2",
                )?,
                None => conn
                    .prepare("SELECT * FROM job_log ORDER BY completed_at DESC LIMIT ?1")?,
            };
            let rows = match plugin {
                Some(name) => stmt.query_map(params![name, limit as i64], JobLogEntry::from_row)?,
                None => stmt.query_map(params![limit as i64], JobLogEntry::from_row)?,
            };
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        })
    }
}
