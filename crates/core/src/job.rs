// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job entity and its state machine (spec §3, §4.2).

use crate::{simple_display, setters, EventContextId, JobId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A command a plugin subprocess can be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCommand {
    Poll,
    Handle,
    Health,
    Init,
}

simple_display! {
    JobCommand {
        Poll => "poll",
        Handle => "handle",
        Health => "health",
        Init => "init",
    }
}

impl JobCommand {
    /// Default classification per spec §4.5: `health` is read, everything else write.
    pub fn is_read_by_default(self) -> bool {
        matches!(self, JobCommand::Health)
    }
}

/// Who caused a job to be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOrigin {
    Scheduler,
    Webhook,
    Route,
    Cli,
    Api,
}

simple_display! {
    JobOrigin {
        Scheduler => "scheduler",
        Webhook => "webhook",
        Route => "route",
        Cli => "cli",
        Api => "api",
    }
}

/// The job state machine (spec §4.2).
///
/// ```text
/// queued ──dequeue──▶ running ──success──▶ succeeded (terminal)
///                            ──failure, attempt<max──▶ queued (retry)
///                            ──failure, attempt=max──▶ dead/failed (terminal)
///                            ──deadline exceeded─▶ timed_out (retry or dead)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Dead,
}

simple_display! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        TimedOut => "timed_out",
        Dead => "dead",
    }
}

impl JobStatus {
    /// Terminal statuses are never re-opened (invariant #1).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Dead)
            || matches!(self, JobStatus::TimedOut)
    }
}

/// The unit of scheduled work (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub plugin: String,
    pub command: JobCommand,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub origin: JobOrigin,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub parent_job_id: Option<JobId>,
    pub source_event_id: Option<uuid::Uuid>,
    pub event_context_id: Option<EventContextId>,
    pub workspace_id: Option<WorkspaceId>,
}

impl Job {
    /// Build a new, never-persisted job in the `queued` state with `attempt = 1`.
    pub fn new(plugin: impl Into<String>, command: JobCommand, origin: JobOrigin) -> Self {
        Self {
            id: JobId::new(),
            plugin: plugin.into(),
            command,
            payload: serde_json::Value::Object(Default::default()),
            status: JobStatus::Queued,
            attempt: 1,
            max_attempts: 5,
            origin,
            dedupe_key: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            next_retry_at: None,
            last_error: None,
            parent_job_id: None,
            source_event_id: None,
            event_context_id: None,
            workspace_id: None,
        }
    }

    setters! {
        into { payload: serde_json::Value }
        set { max_attempts: u32 }
        option { dedupe_key: String }
        option { parent_job_id: JobId }
        option { event_context_id: EventContextId }
        option { workspace_id: WorkspaceId }
    }

    pub fn with_source_event_id(mut self, id: uuid::Uuid) -> Self {
        self.source_event_id = Some(id);
        self
    }
}

/// Minimal projection returned by `Queue::dequeue` (spec §9 open-question resolution:
/// the richer `CommandResult` is what `Complete` accepts, not what `Dequeue` returns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DequeuedJob {
    pub id: JobId,
    pub plugin: String,
    pub command: JobCommand,
    pub payload: serde_json::Value,
    pub attempt: u32,
    pub event_context_id: Option<EventContextId>,
    pub workspace_id: Option<WorkspaceId>,
}

impl From<&Job> for DequeuedJob {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            plugin: job.plugin.clone(),
            command: job.command,
            payload: job.payload.clone(),
            attempt: job.attempt,
            event_context_id: job.event_context_id,
            workspace_id: job.workspace_id,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
