// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S5 — pipeline lineage (spec §8): baggage set at the root survives a
//! multi-hop chain, `origin_` keys are immutable past the root, and a
//! downstream job's lineage points back through its context chain to the
//! job that triggered it.

use chrono::Utc;
use ductile_core::context::EventContext;
use ductile_core::{JobCommand, JobOrigin};
use ductile_pipelines::dag::PipelineSet;
use ductile_pipelines::router::{RouteOutcome, RouteSource, Router};
use ductile_plugins::PluginRegistry;
use ductile_storage::queue::{CompleteOutcome, EnqueueRequest};
use ductile_storage::Storage;
use ductile_wire::{PipelineManifest, PluginEvent};
use ductile_workspace::WorkspaceManager;
use serde_json::json;

use crate::common::write_plugin;

#[test]
fn baggage_survives_a_hop_and_origin_keys_resist_downstream_overwrite() {
    let plugin_root = tempfile::tempdir().unwrap();
    write_plugin(plugin_root.path(), "a", "#!/bin/sh\ncat > /dev/null\necho '{}'\n");
    write_plugin(plugin_root.path(), "b", "#!/bin/sh\ncat > /dev/null\necho '{}'\n");
    write_plugin(plugin_root.path(), "c", "#!/bin/sh\ncat > /dev/null\necho '{}'\n");
    let registry = PluginRegistry::discover(&[plugin_root.path().to_path_buf()]);

    let a_to_b = PipelineManifest::parse(
        "name: a-to-b\ntrigger: a.done\nsteps:\n  - id: s1\n    uses: \"b.handle\"\n",
    )
    .unwrap();
    let b_to_c = PipelineManifest::parse(
        "name: b-to-c\ntrigger: b.done\nsteps:\n  - id: s1\n    uses: \"c.handle\"\n",
    )
    .unwrap();
    let pipelines = PipelineSet::compile(&[a_to_b, b_to_c], &registry).unwrap();

    let storage = Storage::open_in_memory().unwrap();
    let ws_dir = tempfile::tempdir().unwrap();
    let workspaces = WorkspaceManager::new(ws_dir.path());
    let router = Router::new(&pipelines, &storage, &workspaces);

    // A is triggered with a root baggage of origin_user: "matt".
    let root_context = EventContext::root(json!({ "origin_user": "matt" }));
    storage.append_context(&root_context).unwrap();
    let a_job = match storage
        .enqueue(EnqueueRequest {
            event_context_id: Some(root_context.id),
            ..EnqueueRequest::new("a", JobCommand::Poll, JobOrigin::Scheduler)
        }, Utc::now())
        .unwrap()
    {
        ductile_storage::queue::DedupeOutcome::Created(job) => job,
        _ => unreachable!(),
    };
    // Drain A off the queue first, as a dispatcher would before running it
    // and routing the event it emits.
    let a_dequeued = storage.dequeue(Utc::now()).unwrap().unwrap();
    assert_eq!(a_dequeued.id, a_job.id);

    // A emits a.done; the router derives B's context and enqueues B.
    let a_source = RouteSource { job_id: a_job.id, event_context_id: Some(root_context.id), workspace_id: None };
    let a_event = PluginEvent { event_type: "a.done".into(), payload: json!({}), dedupe_key: None };
    let RouteOutcome::Routed { enqueued, .. } = router.route(&a_source, &a_event, Utc::now()).unwrap() else {
        panic!("expected a.done to route to b")
    };
    let b_job_id = enqueued[0];

    let b_dequeued = storage.dequeue(Utc::now()).unwrap().unwrap();
    assert_eq!(b_dequeued.id, b_job_id);
    let b_context = storage.get_context(b_dequeued.event_context_id.unwrap()).unwrap();
    assert_eq!(b_context.parent_id, Some(root_context.id));
    assert_eq!(b_context.baggage["origin_user"], "matt");

    storage
        .complete(b_job_id, CompleteOutcome::Success { result_json: None, stdout: None }, Utc::now())
        .unwrap();
    let b_log = storage.find_job_log(b_job_id).unwrap().unwrap();
    assert_eq!(b_log.parent_job_id, Some(a_job.id));

    // B attempts to overwrite origin_user via an emitted event; the router
    // rejects the overwrite and C still sees "matt".
    let b_source = RouteSource { job_id: b_job_id, event_context_id: Some(b_context.id), workspace_id: None };
    let b_event =
        PluginEvent { event_type: "b.done".into(), payload: json!({ "origin_user": "eve" }), dedupe_key: None };
    let RouteOutcome::Routed { enqueued: c_enqueued, .. } =
        router.route(&b_source, &b_event, Utc::now()).unwrap()
    else {
        panic!("expected b.done to route to c")
    };
    let c_job_id = c_enqueued[0];
    let c_dequeued = storage.dequeue(Utc::now()).unwrap().unwrap();
    assert_eq!(c_dequeued.id, c_job_id);
    let c_context = storage.get_context(c_dequeued.event_context_id.unwrap()).unwrap();
    assert_eq!(c_context.baggage["origin_user"], "matt");
}
