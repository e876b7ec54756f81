// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and migration (spec §4.1).
//!
//! Migrations are a plain numbered list of SQL scripts applied inside a
//! transaction against `PRAGMA user_version`, matching the hand-written
//! migration discipline the daemon's own storage layer documents (no
//! external migration framework).

use rusqlite::Connection;

use crate::error::Result;

/// Ordered migration scripts. Index `i` (1-based) is applied when
/// `user_version < i`.
const MIGRATIONS: &[&str] = &[MIGRATION_0001];

const MIGRATION_0001: &str = r#"
CREATE TABLE job_queue (
    id               TEXT PRIMARY KEY,
    plugin           TEXT NOT NULL,
    command          TEXT NOT NULL,
    payload          TEXT NOT NULL,
    status           TEXT NOT NULL,
    attempt          INTEGER NOT NULL,
    max_attempts     INTEGER NOT NULL,
    origin           TEXT NOT NULL,
    dedupe_key       TEXT,
    created_at       TEXT NOT NULL,
    started_at       TEXT,
    next_retry_at    TEXT,
    last_error       TEXT,
    parent_job_id    TEXT,
    source_event_id  TEXT,
    event_context_id TEXT,
    workspace_id     TEXT
);

CREATE INDEX idx_job_queue_dequeue ON job_queue (status, next_retry_at, created_at);
CREATE INDEX idx_job_queue_dedupe ON job_queue (dedupe_key);
CREATE INDEX idx_job_queue_plugin_command ON job_queue (plugin, command, status);

CREATE TABLE job_log (
    id               TEXT PRIMARY KEY,
    plugin           TEXT NOT NULL,
    command          TEXT NOT NULL,
    status           TEXT NOT NULL,
    attempt          INTEGER NOT NULL,
    origin           TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    started_at       TEXT,
    completed_at     TEXT NOT NULL,
    last_error       TEXT,
    stderr           BLOB,
    stdout           BLOB,
    parent_job_id    TEXT,
    source_event_id  TEXT,
    dedupe_key       TEXT
);

CREATE INDEX idx_job_log_completed_at ON job_log (completed_at);
CREATE INDEX idx_job_log_dedupe ON job_log (dedupe_key, completed_at);

CREATE TABLE plugin_state (
    plugin     TEXT PRIMARY KEY,
    state      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE event_context (
    id         TEXT PRIMARY KEY,
    parent_id  TEXT,
    pipeline   TEXT,
    step_id    TEXT,
    baggage    TEXT NOT NULL,
    hop_count  INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_event_context_parent ON event_context (parent_id);

CREATE TABLE circuit_breaker (
    plugin               TEXT NOT NULL,
    command              TEXT NOT NULL,
    state                TEXT NOT NULL,
    consecutive_failures INTEGER NOT NULL,
    opened_at            TEXT,
    last_failure_at      TEXT,
    last_failing_job_id  TEXT,
    failure_threshold    INTEGER NOT NULL,
    reset_window_secs    INTEGER NOT NULL,
    PRIMARY KEY (plugin, command)
);

CREATE TABLE schedule_entry_state (
    plugin        TEXT PRIMARY KEY,
    last_run_at   TEXT,
    next_run_at   TEXT,
    jitter_secs   INTEGER
);

CREATE TABLE event_seq (
    id  INTEGER PRIMARY KEY AUTOINCREMENT,
    seq INTEGER NOT NULL
);
"#;

/// Open (creating if absent) and migrate the database to the latest schema.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let applied = user_version as usize;

    for (i, script) in MIGRATIONS.iter().enumerate() {
        let version = i + 1;
        if version <= applied {
            continue;
        }
        conn.execute_batch(script)?;
        conn.pragma_update(None, "user_version", version as i64)?;
        tracing::info!(version, "applied storage migration");
    }
    Ok(())
}
