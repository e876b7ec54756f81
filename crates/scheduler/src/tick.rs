// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler's per-tick orchestration (spec §4.6): crash recovery on the
//! first tick, fuzzy-interval schedule evaluation per plugin, the poll guard,
//! the circuit breaker, and the janitor pass.

use ductile_core::{Clock, JobCommand, JobId, JobOrigin};
use ductile_storage::{queue::EnqueueRequest, Storage};
use ductile_wire::PluginManifest;
use ductile_workspace::WorkspaceManager;

use crate::error::SchedulerError;
use crate::interval::compute_next_run;
use crate::poll_guard::{PollGuard, DEFAULT_MAX_OUTSTANDING_POLLS};

/// Job-log and workspace retention applied by the janitor pass (spec §3).
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// What happened during one call to [`Scheduler::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub recovered: usize,
    pub enqueued: Vec<JobId>,
    pub skipped_circuit_open: Vec<String>,
    pub skipped_poll_guard: Vec<String>,
    pub pruned_job_log: usize,
    pub pruned_workspaces: usize,
}

pub struct Scheduler<'a> {
    storage: &'a Storage,
    workspaces: &'a WorkspaceManager,
    clock: &'a dyn Clock,
    max_outstanding_polls: u32,
    retention: chrono::Duration,
}

impl<'a> Scheduler<'a> {
    pub fn new(storage: &'a Storage, workspaces: &'a WorkspaceManager, clock: &'a dyn Clock) -> Self {
        Self {
            storage,
            workspaces,
            clock,
            max_outstanding_polls: DEFAULT_MAX_OUTSTANDING_POLLS,
            retention: chrono::Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }

    pub fn with_max_outstanding_polls(mut self, max: u32) -> Self {
        self.max_outstanding_polls = max;
        self
    }

    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Run one scheduler tick over `plugins` (the set of registered plugin
    /// manifests). `first_tick` triggers crash recovery (spec §9 item 1);
    /// callers are expected to pass `true` exactly once, for the tick
    /// immediately following startup.
    pub fn tick(
        &self,
        plugins: &[PluginManifest],
        first_tick: bool,
    ) -> Result<TickReport, SchedulerError> {
        let now = self.clock.now();
        let mut report = TickReport::default();

        if first_tick {
            report.recovered = self.storage.recover()?;
        }

        for manifest in plugins {
            let Some(schedule) = &manifest.schedule else { continue };
            let entry = self.storage.get_schedule_entry(&manifest.name)?;
            let due = match entry.next_run_at {
                Some(next_run_at) => now >= next_run_at,
                None => true,
            };
            if !due {
                continue;
            }

            let circuit = self.storage.get_circuit(&manifest.name, "poll")?;
            let mut circuit = circuit;
            if !circuit.permits_dispatch(now) {
                self.storage.put_circuit(&circuit)?;
                report.skipped_circuit_open.push(manifest.name.clone());
                continue;
            }
            self.storage.put_circuit(&circuit)?;

            let guard = PollGuard::new(self.storage).with_max_outstanding(self.max_outstanding_polls);
            if !guard.permits(&manifest.name)? {
                report.skipped_poll_guard.push(manifest.name.clone());
                continue;
            }

            // Keyed on the due occurrence's own next_run_at, not wall-clock
            // `now`: two non-transactional calls (enqueue, then
            // put_schedule_entry) straddle this tick, so a crash between them
            // must re-derive the same key on restart rather than minting a
            // fresh one from a new `now` and bypassing dedupe.
            let occurrence_at = entry.next_run_at.unwrap_or(now);
            let dedupe_key = format!("{}:poll:{}", manifest.name, occurrence_at.to_rfc3339());
            let request = EnqueueRequest {
                dedupe_key: Some(dedupe_key),
                ..EnqueueRequest::new(&manifest.name, JobCommand::Poll, JobOrigin::Scheduler)
            };
            let outcome = self.storage.enqueue(request, now)?;
            let job_id = match outcome {
                ductile_storage::queue::DedupeOutcome::Created(job) => job.id,
                ductile_storage::queue::DedupeOutcome::Dropped { existing_job_id } => existing_job_id,
            };
            report.enqueued.push(job_id);

            let base = entry.last_run_at.unwrap_or(now);
            let seed = format!("{}:{}", manifest.name, now.to_rfc3339());
            let (next_run_at, jitter_secs) = compute_next_run(
                base,
                &schedule.every,
                schedule.preferred_window.as_ref(),
                &seed,
            )?;
            self.storage.put_schedule_entry(&ductile_storage::schedule::ScheduleEntryState {
                plugin: manifest.name.clone(),
                last_run_at: Some(now),
                next_run_at: Some(next_run_at),
                jitter_secs: Some(jitter_secs),
            })?;
        }

        report.pruned_job_log = self.storage.prune_job_log(now, self.retention)?;
        report.pruned_workspaces = self.workspaces.run_janitor(self.storage, now, self.retention)?;

        Ok(report)
    }
}
