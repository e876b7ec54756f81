// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S2 — deduplication (spec §8): two back-to-back enqueues sharing a dedupe
//! key collapse to a single queued job.

use chrono::Utc;
use ductile_core::{JobCommand, JobOrigin};
use ductile_storage::queue::{DedupeOutcome, EnqueueRequest};
use ductile_storage::Storage;

#[test]
fn a_second_enqueue_with_the_same_dedupe_key_drops_and_returns_the_first_job_id() {
    let storage = Storage::open_in_memory().unwrap();
    let now = Utc::now();

    let request = |key: &str| EnqueueRequest {
        dedupe_key: Some(key.to_string()),
        ..EnqueueRequest::new("x", JobCommand::Poll, JobOrigin::Webhook)
    };

    let first = storage.enqueue(request("k1"), now).unwrap();
    let first_id = match first {
        DedupeOutcome::Created(job) => job.id,
        DedupeOutcome::Dropped { .. } => panic!("expected the first enqueue to create a job"),
    };

    let second = storage.enqueue(request("k1"), now).unwrap();
    match second {
        DedupeOutcome::Dropped { existing_job_id } => assert_eq!(existing_job_id, first_id),
        DedupeOutcome::Created(_) => panic!("expected the second enqueue to be dropped as a dupe"),
    }

    // Exactly one row backs the key: the first dequeue drains it, the
    // second call finds the queue empty.
    let dequeued = storage.dequeue(now).unwrap().unwrap();
    assert_eq!(dequeued.id, first_id);
    assert!(storage.dequeue(now).unwrap().is_none());
}
