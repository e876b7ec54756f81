// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted scheduler bookkeeping (spec §4.1, §4.6): last/next run per plugin.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::connection::Storage;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntryState {
    pub plugin: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    /// Jitter sampled for the *current* `next_run_at`, stored so it is not
    /// re-sampled on the next tick (spec §4.6.1: "sampled once per scheduled
    /// run, not per tick").
    pub jitter_secs: Option<i64>,
}

impl ScheduleEntryState {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self { plugin: plugin.into(), last_run_at: None, next_run_at: None, jitter_secs: None }
    }
}

impl Storage {
    pub fn get_schedule_entry(&self, plugin: &str) -> Result<ScheduleEntryState> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT last_run_at, next_run_at, jitter_secs FROM schedule_entry_state \
                     WHERE plugin = ?1",
                    params![plugin],
                    |row| {
                        Ok((
                            row.get::<_, Option<DateTime<Utc>>>(0)?,
                            row.get::<_, Option<DateTime<Utc>>>(1)?,
                            row.get::<_, Option<i64>>(2)?,
                        ))
                    },
                )
                .optional()?;
            Ok(match row {
                Some((last_run_at, next_run_at, jitter_secs)) => ScheduleEntryState {
                    plugin: plugin.to_string(),
                    last_run_at,
                    next_run_at,
                    jitter_secs,
                },
                None => ScheduleEntryState::new(plugin),
            })
        })
    }

    pub fn put_schedule_entry(&self, entry: &ScheduleEntryState) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO schedule_entry_state (plugin, last_run_at, next_run_at, \
                 jitter_secs) VALUES (?1,?2,?3,?4) \
                 ON CONFLICT(plugin) DO UPDATE SET last_run_at = excluded.last_run_at, \
                 next_run_at = excluded.next_run_at, jitter_secs = excluded.jitter_secs",
                params![entry.plugin, entry.last_run_at, entry.next_run_at, entry.jitter_secs],
            )?;
            Ok(())
        })
    }
}
