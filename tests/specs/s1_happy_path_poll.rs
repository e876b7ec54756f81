// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S1 — happy-path poll (spec §8): a plugin on a 5-minute schedule produces
//! exactly one successful poll job per due tick, with its state and job log
//! updated accordingly.

use chrono::{TimeZone, Utc};
use ductile_core::{FakeClock, JobStatus};
use ductile_daemon::config::Deadlines;
use ductile_daemon::hub::EventHub;
use ductile_daemon::Dispatcher;
use ductile_pipelines::dag::PipelineSet;
use ductile_plugins::PluginRegistry;
use ductile_scheduler::Scheduler;
use ductile_storage::Storage;
use ductile_workspace::WorkspaceManager;

use crate::common::write_plugin_with_schedule;

#[tokio::test]
async fn one_tick_runs_exactly_one_poll_job_that_succeeds_and_records_state() {
    let plugin_root = tempfile::tempdir().unwrap();
    write_plugin_with_schedule(
        plugin_root.path(),
        "echo",
        Some("5m"),
        "#!/bin/sh\ncat > /dev/null\necho '{\"status\":\"ok\",\"state_updates\":{\"last_run\":\"2026-01-01T00:00:00Z\"}}'\n",
    );
    let registry = PluginRegistry::discover(&[plugin_root.path().to_path_buf()]);
    let storage = Storage::open_in_memory().unwrap();
    let ws_dir = tempfile::tempdir().unwrap();
    let workspaces = WorkspaceManager::new(ws_dir.path());
    let pipelines = PipelineSet::compile(&[], &registry).unwrap();
    let hub = EventHub::new();
    let clock = FakeClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

    let scheduler = Scheduler::new(&storage, &workspaces, &clock);
    let dispatcher =
        Dispatcher::new(&storage, &workspaces, &registry, &pipelines, &hub, Deadlines::default(), vec![]);

    let manifests: Vec<_> = registry.iter().map(|p| p.manifest.clone()).collect();
    let report = scheduler.tick(&manifests, true).unwrap();
    assert_eq!(report.enqueued.len(), 1);

    assert!(dispatcher.dispatch_once().await.unwrap());
    assert!(!dispatcher.dispatch_once().await.unwrap());

    let job_id = report.enqueued[0];
    let log = storage.find_job_log(job_id).unwrap().unwrap();
    assert_eq!(log.status, JobStatus::Succeeded);

    let state = storage.get_state("echo").unwrap();
    assert_eq!(state.state["last_run"], "2026-01-01T00:00:00Z");

    // Within the same 5-minute window a second tick must not enqueue again.
    clock.advance(chrono::Duration::minutes(1));
    let second = scheduler.tick(&manifests, false).unwrap();
    assert!(second.enqueued.is_empty());

    let recent = storage.list_recent_job_log(Some("echo"), 10).unwrap();
    assert_eq!(recent.len(), 1);
}
