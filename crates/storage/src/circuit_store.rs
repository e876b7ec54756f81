// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit-breaker persistence (spec §3, §4.2).

use chrono::{DateTime, Utc};
use ductile_core::{
    circuit::{CircuitBreaker, CircuitState},
    JobId,
};
use rusqlite::{params, OptionalExtension};

use crate::connection::Storage;
use crate::error::Result;

fn parse_state(s: &str) -> CircuitState {
    match s {
        "open" => CircuitState::Open,
        "half_open" => CircuitState::HalfOpen,
        _ => CircuitState::Closed,
    }
}

impl Storage {
    /// Load (or default-construct) the circuit for a (plugin, command) pair.
    pub fn get_circuit(&self, plugin: &str, command: &str) -> Result<CircuitBreaker> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT state, consecutive_failures, opened_at, last_failure_at, \
                     last_failing_job_id, failure_threshold, reset_window_secs \
                     FROM circuit_breaker WHERE plugin = ?1 AND command = ?2",
                    params![plugin, command],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<DateTime<Utc>>>(2)?,
                            row.get::<_, Option<DateTime<Utc>>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, i64>(6)?,
                        ))
                    },
                )
                .optional()?;
            Ok(match row {
                Some((state, failures, opened_at, last_failure_at, last_job, threshold, reset)) => {
                    CircuitBreaker {
                        plugin: plugin.to_string(),
                        command: command.to_string(),
                        state: parse_state(&state),
                        consecutive_failures: failures as u32,
                        opened_at,
                        last_failure_at,
                        last_failing_job_id: last_job.map(JobId::from_string),
                        failure_threshold: threshold as u32,
                        reset_window: chrono::Duration::seconds(reset),
                    }
                }
                None => CircuitBreaker::closed(plugin, command),
            })
        })
    }

    /// Persist a circuit's current state (upsert).
    pub fn put_circuit(&self, circuit: &CircuitBreaker) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO circuit_breaker (plugin, command, state, consecutive_failures, \
                 opened_at, last_failure_at, last_failing_job_id, failure_threshold, \
                 reset_window_secs) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9) \
                 ON CONFLICT(plugin, command) DO UPDATE SET state = excluded.state, \
                 consecutive_failures = excluded.consecutive_failures, opened_at = \
                 excluded.opened_at, last_failure_at = excluded.last_failure_at, \
                 last_failing_job_id = excluded.last_failing_job_id",
                params![
                    circuit.plugin,
                    circuit.command,
                    circuit.state.to_string(),
                    circuit.consecutive_failures,
                    circuit.opened_at,
                    circuit.last_failure_at,
                    circuit.last_failing_job_id.map(|id| id.as_str().to_string()),
                    circuit.failure_threshold,
                    circuit.reset_window.num_seconds(),
                ],
            )?;
            Ok(())
        })
    }

    /// Administrative manual reset (spec §3: "manually resettable").
    pub fn reset_circuit(&self, plugin: &str, command: &str) -> Result<()> {
        let mut circuit = self.get_circuit(plugin, command)?;
        circuit.reset();
        self.put_circuit(&circuit)
    }
}
