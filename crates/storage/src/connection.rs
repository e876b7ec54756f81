// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The storage handle: single-writer connection plus the monotonic
//! `event_seq` counter used for SSE ordering (spec §4.1).

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::Result;
use crate::schema;

/// Single-writer, many-reader storage handle. The dispatcher is the only
/// writer of `job_queue`; the scheduler, janitor, and any read-only status
/// surface share this same connection behind the mutex, matching spec §4.1's
/// "single-writer semantics; readers coexist."
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run `f` with exclusive access to the connection. Every cross-table
    /// write in this crate goes through this single choke point so a
    /// transaction never interleaves with another caller's statements.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Allocate the next monotonically increasing sequence number for SSE
    /// broadcast ordering (spec §4.1, §5).
    pub fn next_event_seq(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO event_seq (seq) VALUES (0)", [])?;
            Ok(conn.last_insert_rowid())
        })
    }
}
