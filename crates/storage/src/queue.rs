// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue operations (spec §4.2): Enqueue, Dequeue, Complete, Recover.

use chrono::{DateTime, Utc};
use ductile_core::{
    circuit::CircuitState, DequeuedJob, EventContextId, Job, JobCommand, JobId, JobOrigin,
    JobStatus, WorkspaceId,
};
use rusqlite::{params, OptionalExtension, Row};

use crate::connection::Storage;
use crate::error::{Result, StorageError};
use crate::job_log::JobLogEntry;

/// Default retry backoff base (spec §4.2).
pub const DEFAULT_BACKOFF_BASE_SECS: i64 = 30;

/// Input to `Queue::enqueue`.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub plugin: String,
    pub command: JobCommand,
    pub payload: serde_json::Value,
    pub origin: JobOrigin,
    pub max_attempts: u32,
    pub dedupe_key: Option<String>,
    pub dedupe_ttl: chrono::Duration,
    pub parent_job_id: Option<JobId>,
    pub source_event_id: Option<uuid::Uuid>,
    pub event_context_id: Option<EventContextId>,
    pub workspace_id: Option<WorkspaceId>,
}

impl EnqueueRequest {
    pub fn new(plugin: impl Into<String>, command: JobCommand, origin: JobOrigin) -> Self {
        Self {
            plugin: plugin.into(),
            command,
            payload: serde_json::Value::Object(Default::default()),
            origin,
            max_attempts: 5,
            dedupe_key: None,
            dedupe_ttl: chrono::Duration::hours(24),
            parent_job_id: None,
            source_event_id: None,
            event_context_id: None,
            workspace_id: None,
        }
    }
}

/// Typed outcome of `Queue::enqueue` — dedupe suppression is not an error
/// (spec §7).
#[derive(Debug, Clone)]
pub enum DedupeOutcome {
    Created(Job),
    Dropped { existing_job_id: JobId },
}

/// Disposition Complete is told to apply, carrying the richer result object
/// the open question in spec §9 resolves `Complete` to accept.
#[derive(Debug, Clone)]
pub enum CompleteOutcome {
    Success { result_json: Option<serde_json::Value>, stdout: Option<Vec<u8>> },
    Failure { retryable: bool, error: String, stderr: Option<Vec<u8>>, stdout: Option<Vec<u8>> },
    TimedOut { error: String },
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    let command: String = row.get("command")?;
    let status: String = row.get("status")?;
    let origin: String = row.get("origin")?;
    let payload_raw: String = row.get("payload")?;
    Ok(Job {
        id: JobId::from_string(row.get::<_, String>("id")?),
        plugin: row.get("plugin")?,
        command: parse_command(&command),
        payload: serde_json::from_str(&payload_raw).unwrap_or(serde_json::Value::Null),
        status: parse_status(&status),
        attempt: row.get::<_, i64>("attempt")? as u32,
        max_attempts: row.get::<_, i64>("max_attempts")? as u32,
        origin: parse_origin(&origin),
        dedupe_key: row.get("dedupe_key")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        completed_at: None,
        next_retry_at: row.get("next_retry_at")?,
        last_error: row.get("last_error")?,
        parent_job_id: row.get::<_, Option<String>>("parent_job_id")?.map(JobId::from_string),
        source_event_id: row
            .get::<_, Option<String>>("source_event_id")?
            .and_then(|s| uuid::Uuid::parse_str(&s).ok()),
        event_context_id: row
            .get::<_, Option<String>>("event_context_id")?
            .map(EventContextId::from_string),
        workspace_id: row.get::<_, Option<String>>("workspace_id")?.map(WorkspaceId::from_string),
    })
}

pub(crate) fn parse_command(s: &str) -> JobCommand {
    match s {
        "poll" => JobCommand::Poll,
        "handle" => JobCommand::Handle,
        "health" => JobCommand::Health,
        _ => JobCommand::Init,
    }
}

pub(crate) fn parse_status(s: &str) -> JobStatus {
    match s {
        "queued" => JobStatus::Queued,
        "running" => JobStatus::Running,
        "succeeded" => JobStatus::Succeeded,
        "failed" => JobStatus::Failed,
        "timed_out" => JobStatus::TimedOut,
        _ => JobStatus::Dead,
    }
}

pub(crate) fn parse_origin(s: &str) -> JobOrigin {
    match s {
        "scheduler" => JobOrigin::Scheduler,
        "webhook" => JobOrigin::Webhook,
        "route" => JobOrigin::Route,
        "cli" => JobOrigin::Cli,
        _ => JobOrigin::Api,
    }
}

impl Storage {
    /// Insert a new job, applying dedupe suppression (spec §4.2).
    pub fn enqueue(&self, req: EnqueueRequest, now: DateTime<Utc>) -> Result<DedupeOutcome> {
        self.with_conn(|conn| {
            if let Some(key) = &req.dedupe_key {
                // In-flight duplicate: still in job_queue (queued/running).
                let in_flight: Option<String> = conn
                    .query_row(
                        "SELECT id FROM job_queue WHERE dedupe_key = ?1 LIMIT 1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = in_flight {
                    tracing::info!(dedupe_key = %key, existing_job_id = %id, "enqueue suppressed: in-flight duplicate");
                    return Ok(DedupeOutcome::Dropped { existing_job_id: JobId::from_string(id) });
                }

                // Succeeded duplicate within dedupe_ttl: check job_log.
                let cutoff = now - req.dedupe_ttl;
                let succeeded: Option<String> = conn
                    .query_row(
                        "SELECT id FROM job_log WHERE dedupe_key = ?1 AND status = 'succeeded' \
                         AND completed_at >= ?2 ORDER BY completed_at DESC LIMIT 1",
                        params![key, cutoff],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = succeeded {
                    tracing::info!(dedupe_key = %key, existing_job_id = %id, "enqueue suppressed: recently succeeded duplicate");
                    return Ok(DedupeOutcome::Dropped { existing_job_id: JobId::from_string(id) });
                }
            }

            let job = Job {
                id: JobId::new(),
                plugin: req.plugin,
                command: req.command,
                payload: req.payload,
                status: JobStatus::Queued,
                attempt: 1,
                max_attempts: req.max_attempts,
                origin: req.origin,
                dedupe_key: req.dedupe_key,
                created_at: now,
                started_at: None,
                completed_at: None,
                next_retry_at: None,
                last_error: None,
                parent_job_id: req.parent_job_id,
                source_event_id: req.source_event_id,
                event_context_id: req.event_context_id,
                workspace_id: req.workspace_id,
            };
            conn.execute(
                "INSERT INTO job_queue (id, plugin, command, payload, status, attempt, \
                 max_attempts, origin, dedupe_key, created_at, started_at, next_retry_at, \
                 last_error, parent_job_id, source_event_id, event_context_id, workspace_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    job.id.as_str(),
                    job.plugin,
                    job.command.to_string(),
                    serde_json::to_string(&job.payload)?,
                    job.status.to_string(),
                    job.attempt,
                    job.max_attempts,
                    job.origin.to_string(),
                    job.dedupe_key,
                    job.created_at,
                    job.started_at,
                    job.next_retry_at,
                    job.last_error,
                    job.parent_job_id.map(|id| id.as_str().to_string()),
                    job.source_event_id.map(|id| id.to_string()),
                    job.event_context_id.map(|id| id.as_str().to_string()),
                    job.workspace_id.map(|id| id.as_str().to_string()),
                ],
            )?;
            Ok(DedupeOutcome::Created(job))
        })
    }

    /// Atomically select and lease the oldest eligible `queued` row (spec §4.2).
    /// Open circuit breakers only gate scheduler-originated `poll` jobs;
    /// webhook- and API-triggered jobs for the same (plugin, command) bypass.
    pub fn dequeue(&self, now: DateTime<Utc>) -> Result<Option<DequeuedJob>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let candidate = tx
                .query_row(
                    "SELECT * FROM job_queue WHERE status = 'queued' \
                     AND (next_retry_at IS NULL OR next_retry_at <= ?1) \
                     ORDER BY created_at ASC, id ASC LIMIT 1",
                    params![now],
                    row_to_job,
                )
                .optional()?;

            let Some(job) = candidate else {
                return Ok(None);
            };

            // Circuit breaker gating applies only to scheduler-originated
            // `poll` jobs; webhook- and API-triggered jobs bypass (spec §3).
            let gated = job.origin == JobOrigin::Scheduler && job.command == JobCommand::Poll;
            let circuit_open: bool = gated
                && tx
                    .query_row(
                        "SELECT state FROM circuit_breaker WHERE plugin = ?1 AND command = ?2",
                        params![job.plugin, job.command.to_string()],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?
                    .map(|s| s == CircuitState::Open.to_string())
                    .unwrap_or(false);

            if circuit_open {
                return Ok(None);
            }

            tx.execute(
                "UPDATE job_queue SET status = 'running', started_at = ?2 WHERE id = ?1",
                params![job.id.as_str(), now],
            )?;
            tx.commit()?;
            Ok(Some(DequeuedJob::from(&job)))
        })
    }

    /// Apply a completion outcome (spec §4.2). Requires the job be `running`.
    pub fn complete(
        &self,
        job_id: JobId,
        outcome: CompleteOutcome,
        now: DateTime<Utc>,
    ) -> Result<JobStatus> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let job = tx
                .query_row(
                    "SELECT * FROM job_queue WHERE id = ?1",
                    params![job_id.as_str()],
                    row_to_job,
                )
                .optional()?
                .ok_or_else(|| StorageError::JobNotFound(job_id.as_str().to_string()))?;

            if job.status != JobStatus::Running {
                return Err(StorageError::WrongStatus {
                    job_id: job_id.as_str().to_string(),
                    expected: JobStatus::Running.to_string(),
                    actual: job.status.to_string(),
                });
            }

            let final_status = match &outcome {
                CompleteOutcome::Success { .. } => JobStatus::Succeeded,
                CompleteOutcome::TimedOut { .. } => JobStatus::TimedOut,
                CompleteOutcome::Failure { .. } => JobStatus::Failed,
            };

            let retryable = match &outcome {
                CompleteOutcome::Success { .. } => false,
                CompleteOutcome::TimedOut { .. } => true,
                CompleteOutcome::Failure { retryable, .. } => *retryable,
            };

            let terminal = !retryable || job.attempt >= job.max_attempts;

            if terminal {
                let (last_error, stderr, stdout) = match &outcome {
                    CompleteOutcome::Success { stdout, .. } => (None, None, stdout.clone()),
                    CompleteOutcome::TimedOut { error } => (Some(error.clone()), None, None),
                    CompleteOutcome::Failure { error, stderr, stdout, .. } => {
                        (Some(error.clone()), stderr.clone(), stdout.clone())
                    }
                };
                let status = if matches!(outcome, CompleteOutcome::Success { .. }) {
                    JobStatus::Succeeded
                } else if job.attempt >= job.max_attempts && retryable {
                    JobStatus::Dead
                } else {
                    final_status
                };

                tx.execute(
                    "INSERT INTO job_log (id, plugin, command, status, attempt, origin, \
                     created_at, started_at, completed_at, last_error, stderr, stdout, \
                     parent_job_id, source_event_id, dedupe_key) \
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                    params![
                        job.id.as_str(),
                        job.plugin,
                        job.command.to_string(),
                        status.to_string(),
                        job.attempt,
                        job.origin.to_string(),
                        job.created_at,
                        job.started_at,
                        now,
                        last_error,
                        stderr,
                        stdout,
                        job.parent_job_id.map(|id| id.as_str().to_string()),
                        job.source_event_id.map(|id| id.to_string()),
                        job.dedupe_key,
                    ],
                )?;
                tx.execute("DELETE FROM job_queue WHERE id = ?1", params![job.id.as_str()])?;
                tx.commit()?;
                return Ok(status);
            }

            // Retry: requeue with incremented attempt and backoff.
            let error = match &outcome {
                CompleteOutcome::TimedOut { error } => error.clone(),
                CompleteOutcome::Failure { error, .. } => error.clone(),
                CompleteOutcome::Success { .. } => unreachable!("success is never retried"),
            };
            let next_attempt = job.attempt + 1;
            let backoff = retry_backoff(next_attempt, DEFAULT_BACKOFF_BASE_SECS);
            let next_retry_at = now + backoff;
            tx.execute(
                "UPDATE job_queue SET status = 'queued', attempt = ?2, next_retry_at = ?3, \
                 last_error = ?4, started_at = NULL WHERE id = ?1",
                params![job.id.as_str(), next_attempt, next_retry_at, error],
            )?;
            tx.commit()?;
            Ok(JobStatus::Queued)
        })
    }

    /// Scan for rows stuck `running` from a crashed prior run (spec §4.2, §9
    /// item 1). Each orphan either returns to `queued` with incremented
    /// attempt, or is marked `dead`.
    pub fn recover(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let orphans: Vec<Job> = {
                let mut stmt =
                    tx.prepare("SELECT * FROM job_queue WHERE status = 'running'")?;
                let rows = stmt.query_map([], row_to_job)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            let count = orphans.len();
            for job in orphans {
                let next_attempt = job.attempt + 1;
                if next_attempt <= job.max_attempts {
                    tx.execute(
                        "UPDATE job_queue SET status = 'queued', attempt = ?2, started_at = \
                         NULL, next_retry_at = NULL WHERE id = ?1",
                        params![job.id.as_str(), next_attempt],
                    )?;
                    tracing::warn!(job_id = %job.id, attempt = next_attempt, "recovered orphaned running job");
                } else {
                    tx.execute(
                        "INSERT INTO job_log (id, plugin, command, status, attempt, origin, \
                         created_at, started_at, completed_at, last_error, parent_job_id, \
                         source_event_id, dedupe_key) \
                         VALUES (?1,?2,?3,'dead',?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                        params![
                            job.id.as_str(),
                            job.plugin,
                            job.command.to_string(),
                            job.attempt,
                            job.origin.to_string(),
                            job.created_at,
                            job.started_at,
                            Utc::now(),
                            "exceeded max_attempts during crash recovery",
                            job.parent_job_id.map(|id| id.as_str().to_string()),
                            job.source_event_id.map(|id| id.to_string()),
                            job.dedupe_key,
                        ],
                    )?;
                    tx.execute("DELETE FROM job_queue WHERE id = ?1", params![job.id.as_str()])?;
                    tracing::warn!(job_id = %job.id, "orphaned running job exceeded max_attempts, marked dead");
                }
            }
            tx.commit()?;
            Ok(count)
        })
    }

    /// Count `poll` jobs of `plugin` currently `queued` or `running` (spec
    /// §4.6.2 poll guard).
    pub fn count_outstanding_polls(&self, plugin: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM job_queue WHERE plugin = ?1 AND command = 'poll' \
                 AND status IN ('queued', 'running')",
                params![plugin],
                |row| row.get(0),
            )?;
            Ok(count as u32)
        })
    }

    /// Fetch the latest job_log row for a dedupe key, used by the enqueue dedupe check's tests.
    pub fn find_job_log(&self, id: JobId) -> Result<Option<JobLogEntry>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM job_log WHERE id = ?1", params![id.as_str()], |row| {
                JobLogEntry::from_row(row)
            })
            .optional()
            .map_err(Into::into)
        })
    }
}

/// `base · 2^(attempt-1) + jitter(0, base)` (spec §4.2). `attempt` here is
/// the attempt number the retry is *entering*, i.e. already incremented.
pub fn retry_backoff(attempt: u32, base_secs: i64) -> chrono::Duration {
    let exp = attempt.saturating_sub(1).min(20);
    let backoff = base_secs.saturating_mul(1i64 << exp.min(40));
    // Deterministic, non-cryptographic jitter derived from attempt so tests
    // can assert bounds without a random source crossing the FFI boundary.
    let jitter = (attempt as i64 * 2654435761) % base_secs.max(1);
    chrono::Duration::seconds(backoff + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ductile_core::JobCommand;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn enqueue_then_dequeue_flips_to_running() {
        let storage = Storage::open_in_memory().unwrap();
        let req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        let DedupeOutcome::Created(job) = storage.enqueue(req, now()).unwrap() else {
            panic!("expected created");
        };
        let dequeued = storage.dequeue(now()).unwrap().unwrap();
        assert_eq!(dequeued.id, job.id);
        let again = storage.dequeue(now()).unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn dedupe_suppresses_in_flight_duplicate() {
        let storage = Storage::open_in_memory().unwrap();
        let mut req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        req.dedupe_key = Some("k1".into());
        let DedupeOutcome::Created(first) = storage.enqueue(req.clone(), now()).unwrap() else {
            panic!("expected created");
        };
        let outcome = storage.enqueue(req, now()).unwrap();
        match outcome {
            DedupeOutcome::Dropped { existing_job_id } => assert_eq!(existing_job_id, first.id),
            DedupeOutcome::Created(_) => panic!("expected dedupe drop"),
        }
    }

    #[test]
    fn complete_success_moves_to_job_log_and_clears_queue() {
        let storage = Storage::open_in_memory().unwrap();
        let req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        let DedupeOutcome::Created(job) = storage.enqueue(req, now()).unwrap() else {
            panic!()
        };
        storage.dequeue(now()).unwrap();
        let status = storage
            .complete(job.id, CompleteOutcome::Success { result_json: None, stdout: None }, now())
            .unwrap();
        assert_eq!(status, JobStatus::Succeeded);
        assert!(storage.find_job_log(job.id).unwrap().is_some());
        let empty = storage.dequeue(now()).unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn complete_failure_retries_until_max_attempts_then_dead() {
        let storage = Storage::open_in_memory().unwrap();
        let mut req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        req.max_attempts = 2;
        let DedupeOutcome::Created(job) = storage.enqueue(req, now()).unwrap() else {
            panic!()
        };

        storage.dequeue(now()).unwrap();
        let status = storage
            .complete(
                job.id,
                CompleteOutcome::Failure {
                    retryable: true,
                    error: "boom".into(),
                    stderr: None,
                    stdout: None,
                },
                now(),
            )
            .unwrap();
        assert_eq!(status, JobStatus::Queued);

        // Force the retry to be immediately eligible.
        storage
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE job_queue SET next_retry_at = NULL WHERE id = ?1",
                    params![job.id.as_str()],
                )?;
                Ok(())
            })
            .unwrap();

        storage.dequeue(now()).unwrap();
        let status = storage
            .complete(
                job.id,
                CompleteOutcome::Failure {
                    retryable: true,
                    error: "boom again".into(),
                    stderr: None,
                    stdout: None,
                },
                now(),
            )
            .unwrap();
        assert_eq!(status, JobStatus::Dead);
    }

    #[test]
    fn recover_requeues_orphans_with_incremented_attempt() {
        let storage = Storage::open_in_memory().unwrap();
        let req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        let DedupeOutcome::Created(job) = storage.enqueue(req, now()).unwrap() else {
            panic!()
        };
        storage.dequeue(now()).unwrap(); // simulate crash while running

        let recovered = storage.recover().unwrap();
        assert_eq!(recovered, 1);

        let dequeued = storage.dequeue(now()).unwrap().unwrap();
        assert_eq!(dequeued.id, job.id);
        assert_eq!(dequeued.attempt, 2);
    }

    #[test]
    fn recover_marks_dead_when_attempt_would_exceed_max() {
        let storage = Storage::open_in_memory().unwrap();
        let mut req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        req.max_attempts = 1;
        let DedupeOutcome::Created(_job) = storage.enqueue(req, now()).unwrap() else {
            panic!()
        };
        storage.dequeue(now()).unwrap();
        storage.recover().unwrap();
        let empty = storage.dequeue(now()).unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn count_outstanding_polls_tracks_queued_and_running() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.count_outstanding_polls("echo").unwrap(), 0);

        let req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        storage.enqueue(req, now()).unwrap();
        assert_eq!(storage.count_outstanding_polls("echo").unwrap(), 1);

        storage.dequeue(now()).unwrap();
        assert_eq!(storage.count_outstanding_polls("echo").unwrap(), 1);
    }

    #[test]
    fn an_open_circuit_blocks_a_scheduler_poll_job_but_not_a_webhook_job() {
        let storage = Storage::open_in_memory().unwrap();

        let mut circuit = storage.get_circuit("echo", "poll").unwrap();
        for _ in 0..3 {
            circuit.record_failure(now(), JobId::new());
        }
        storage.put_circuit(&circuit).unwrap();
        assert_eq!(circuit.state, ductile_core::circuit::CircuitState::Open);

        let poll_req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
        storage.enqueue(poll_req, now()).unwrap();
        assert!(storage.dequeue(now()).unwrap().is_none());

        let webhook_req = EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Webhook);
        storage.enqueue(webhook_req, now()).unwrap();
        let dequeued = storage.dequeue(now()).unwrap();
        assert!(dequeued.is_some());
    }

    #[test]
    fn retry_backoff_grows_exponentially() {
        let b1 = retry_backoff(2, 30).num_seconds();
        let b2 = retry_backoff(3, 30).num_seconds();
        assert!(b2 > b1);
    }

    #[yare::parameterized(
        attempt_1  = { 1, 30 },
        attempt_2  = { 2, 30 },
        attempt_3  = { 3, 30 },
        attempt_10 = { 10, 30 },
    )]
    fn retry_backoff_is_at_least_the_exponential_floor(attempt: u32, base_secs: i64) {
        let exp = attempt.saturating_sub(1).min(20);
        let floor = base_secs.saturating_mul(1i64 << exp.min(40));
        assert!(retry_backoff(attempt, base_secs).num_seconds() >= floor);
    }

    proptest! {
        /// Invariant: attempt never decreases across a run of retryable
        /// failures, and the job reaches a terminal state (present in
        /// job_log, absent from job_queue) exactly once, at or before
        /// max_attempts.
        #[test]
        fn attempt_is_monotonic_and_job_goes_terminal_exactly_once(
            max_attempts in 1u32..6,
            failure_count in 0u32..10,
        ) {
            let storage = Storage::open_in_memory().unwrap();
            let mut clock = now();
            let req = EnqueueRequest {
                max_attempts,
                ..EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler)
            };
            let DedupeOutcome::Created(job) = storage.enqueue(req, clock).unwrap() else {
                unreachable!()
            };

            let mut last_attempt = 0u32;
            let mut went_terminal_at = None;
            for i in 0..failure_count {
                // Advance well past any retry backoff so the job is always
                // eligible for dequeue.
                clock = clock + chrono::Duration::days(1);
                let Some(dequeued) = storage.dequeue(clock).unwrap() else {
                    prop_assert!(went_terminal_at.is_some(), "queue emptied before the job went terminal");
                    break;
                };
                prop_assert!(dequeued.attempt >= last_attempt, "attempt regressed");
                last_attempt = dequeued.attempt;

                storage
                    .complete(
                        job.id,
                        CompleteOutcome::Failure {
                            retryable: true,
                            error: "boom".to_string(),
                            stderr: None,
                            stdout: None,
                        },
                        clock,
                    )
                    .unwrap();

                if storage.find_job_log(job.id).unwrap().is_some() {
                    prop_assert!(went_terminal_at.is_none(), "job went terminal twice");
                    went_terminal_at = Some(i);
                }
            }

            if let Some(log) = storage.find_job_log(job.id).unwrap() {
                prop_assert!(log.attempt <= max_attempts);
                prop_assert!(storage.dequeue(clock).unwrap().is_none());
            }
        }
    }
}
