// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S4 — timeout enforcement (spec §8): a plugin that outlives its deadline
//! is terminated (SIGTERM, then SIGKILL after a grace period) and the job is
//! marked `timed_out`, then `dead` once attempts are exhausted.

use std::time::Duration;

use chrono::Utc;
use ductile_core::{JobCommand, JobOrigin, JobStatus};
use ductile_daemon::config::Deadlines;
use ductile_daemon::hub::EventHub;
use ductile_daemon::Dispatcher;
use ductile_pipelines::dag::PipelineSet;
use ductile_plugins::PluginRegistry;
use ductile_storage::queue::{DedupeOutcome, EnqueueRequest};
use ductile_storage::Storage;
use ductile_workspace::WorkspaceManager;

use crate::common::write_plugin;

#[tokio::test]
async fn a_sleeping_plugin_past_its_deadline_is_killed_and_the_job_goes_dead() {
    let plugin_root = tempfile::tempdir().unwrap();
    write_plugin(plugin_root.path(), "slow", "#!/bin/sh\ncat > /dev/null\nsleep 30\n");
    let registry = PluginRegistry::discover(&[plugin_root.path().to_path_buf()]);

    let storage = Storage::open_in_memory().unwrap();
    let ws_dir = tempfile::tempdir().unwrap();
    let workspaces = WorkspaceManager::new(ws_dir.path());
    let pipelines = PipelineSet::compile(&[], &registry).unwrap();
    let hub = EventHub::new();

    // A single attempt: the timeout, being retryable in principle, goes
    // straight to `dead` once `max_attempts` is exhausted (spec §4.2),
    // without waiting out the real retry backoff in this test.
    let request = EnqueueRequest { max_attempts: 1, ..EnqueueRequest::new("slow", JobCommand::Poll, JobOrigin::Scheduler) };
    let enqueued = storage.enqueue(request, Utc::now()).unwrap();
    let job_id = match enqueued {
        DedupeOutcome::Created(job) => job.id,
        DedupeOutcome::Dropped { .. } => unreachable!(),
    };

    let deadlines = Deadlines { poll: Duration::from_secs(2), ..Deadlines::default() };
    let dispatcher =
        Dispatcher::new(&storage, &workspaces, &registry, &pipelines, &hub, deadlines, vec![]);

    let started = std::time::Instant::now();
    assert!(dispatcher.dispatch_once().await.unwrap());
    // 2s deadline plus a 5s SIGTERM grace, with headroom for scheduling jitter.
    assert!(started.elapsed() < Duration::from_secs(10), "timeout enforcement took too long");

    let log = storage.find_job_log(job_id).unwrap().unwrap();
    assert_eq!(log.status, JobStatus::Dead);
    assert_eq!(log.attempt, 1);
}
