// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S6 — zero-copy workspace (spec §8): a split pipeline A→{B,C} fans a
//! file A wrote into both downstream workspaces via hardlink, not a byte
//! copy, and the two clones are independent once created (in-place edits to
//! a shared inode would still be visible to both — see the workspace
//! manager's own clone tests for that caveat).

use chrono::Utc;
use ductile_core::{JobCommand, JobOrigin, WorkspaceId};
use ductile_pipelines::dag::PipelineSet;
use ductile_pipelines::router::{RouteOutcome, RouteSource, Router};
use ductile_plugins::PluginRegistry;
use ductile_storage::queue::EnqueueRequest;
use ductile_storage::Storage;
use ductile_wire::{PipelineManifest, PluginEvent};
use ductile_workspace::WorkspaceManager;
use serde_json::json;

use crate::common::write_plugin;

#[test]
fn a_split_pipeline_hardlinks_the_same_file_into_both_branch_workspaces() {
    let plugin_root = tempfile::tempdir().unwrap();
    write_plugin(plugin_root.path(), "a", "#!/bin/sh\ncat > /dev/null\necho '{}'\n");
    write_plugin(plugin_root.path(), "b", "#!/bin/sh\ncat > /dev/null\necho '{}'\n");
    write_plugin(plugin_root.path(), "c", "#!/bin/sh\ncat > /dev/null\necho '{}'\n");
    let registry = PluginRegistry::discover(&[plugin_root.path().to_path_buf()]);

    let manifest = PipelineManifest::parse(
        "name: split\ntrigger: a.done\nsteps:\n  - id: s1\n    split:\n      \
         - id: s1a\n        uses: \"b.handle\"\n      - id: s1b\n        uses: \"c.handle\"\n",
    )
    .unwrap();
    let pipelines = PipelineSet::compile(&[manifest], &registry).unwrap();

    let storage = Storage::open_in_memory().unwrap();
    let ws_dir = tempfile::tempdir().unwrap();
    let workspaces = WorkspaceManager::new(ws_dir.path());
    let router = Router::new(&pipelines, &storage, &workspaces);

    // A's own workspace, pre-populated with a 10 MiB output file.
    let a_workspace = WorkspaceId::new();
    let a_path = workspaces.create(a_workspace).unwrap();
    std::fs::write(a_path.join("out.bin"), vec![0u8; 10 * 1024 * 1024]).unwrap();

    let a_job = match storage
        .enqueue(EnqueueRequest { workspace_id: Some(a_workspace), ..EnqueueRequest::new("a", JobCommand::Poll, JobOrigin::Scheduler) }, Utc::now())
        .unwrap()
    {
        ductile_storage::queue::DedupeOutcome::Created(job) => job,
        _ => unreachable!(),
    };
    storage.dequeue(Utc::now()).unwrap();

    let source = RouteSource { job_id: a_job.id, event_context_id: None, workspace_id: Some(a_workspace) };
    let event = PluginEvent { event_type: "a.done".into(), payload: json!({}), dedupe_key: None };
    let RouteOutcome::Routed { enqueued, .. } = router.route(&source, &event, Utc::now()).unwrap() else {
        panic!("expected a.done to fan out to b and c")
    };
    assert_eq!(enqueued.len(), 2);

    let first = storage.dequeue(Utc::now()).unwrap().unwrap();
    let second = storage.dequeue(Utc::now()).unwrap().unwrap();
    let b_path = workspaces.open(first.workspace_id.unwrap()).unwrap();
    let c_path = workspaces.open(second.workspace_id.unwrap()).unwrap();

    let b_file = b_path.join("out.bin");
    let c_file = c_path.join("out.bin");
    assert!(b_file.exists());
    assert!(c_file.exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let a_ino = std::fs::metadata(a_path.join("out.bin")).unwrap().ino();
        let b_ino = std::fs::metadata(&b_file).unwrap().ino();
        let c_ino = std::fs::metadata(&c_file).unwrap().ino();
        assert_eq!(a_ino, b_ino);
        assert_eq!(a_ino, c_ino);
    }

    std::fs::remove_file(&b_file).unwrap();
    assert!(c_file.exists(), "deleting the link in B must not remove C's copy");
}
