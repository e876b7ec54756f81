// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-(plugin, command) circuit breaker (spec §3).

use crate::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

crate::simple_display! {
    CircuitState {
        Closed => "closed",
        Open => "open",
        HalfOpen => "half_open",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub plugin: String,
    pub command: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_failing_job_id: Option<JobId>,
    pub failure_threshold: u32,
    pub reset_window: chrono::Duration,
}

impl CircuitBreaker {
    pub fn closed(plugin: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            command: command.into(),
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_failure_at: None,
            last_failing_job_id: None,
            failure_threshold: 3,
            reset_window: chrono::Duration::minutes(30),
        }
    }

    /// Is the circuit currently blocking new scheduler-originated polls?
    /// Transitions `open` → `half_open` lazily, based on `now`.
    pub fn permits_dispatch(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == CircuitState::Open {
            if let Some(opened_at) = self.opened_at {
                if now - opened_at >= self.reset_window {
                    self.state = CircuitState::HalfOpen;
                }
            }
        }
        self.state != CircuitState::Open
    }

    pub fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>, job_id: JobId) {
        self.consecutive_failures += 1;
        self.last_failure_at = Some(now);
        self.last_failing_job_id = Some(job_id);
        match self.state {
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
            }
            CircuitState::Closed if self.consecutive_failures >= self.failure_threshold => {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
            }
            _ => {}
        }
    }

    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.last_failure_at = None;
        self.last_failing_job_id = None;
    }
}
