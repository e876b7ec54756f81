// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3 — crash recovery (spec §8): a job stuck `running` across a restart
//! comes back `queued` with its attempt incremented, and completes on the
//! next dispatch. `Storage::recover` logs a WARN per orphan (see its own
//! unit tests in `crates/storage/src/queue.rs`); not re-asserted here since
//! capturing `tracing` output would require a dependency the rest of the
//! workspace doesn't carry.

use chrono::Utc;
use ductile_core::{JobCommand, JobOrigin, JobStatus};
use ductile_storage::queue::{CompleteOutcome, EnqueueRequest};
use ductile_storage::Storage;

#[test]
fn an_orphaned_running_job_resumes_queued_with_attempt_incremented() {
    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("ductile.sqlite3");

    let request = EnqueueRequest { max_attempts: 2, ..EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler) };

    let storage = Storage::open(&db_path).unwrap();
    let enqueued = storage.enqueue(request, Utc::now()).unwrap();
    let job_id = match enqueued {
        ductile_storage::queue::DedupeOutcome::Created(job) => job.id,
        _ => unreachable!(),
    };
    let dequeued = storage.dequeue(Utc::now()).unwrap().unwrap();
    assert_eq!(dequeued.id, job_id);
    assert_eq!(dequeued.attempt, 1);

    // Process dies here without completing the job; `storage` drops without
    // a clean shutdown.
    drop(storage);

    // Restart against the same on-disk database.
    let restarted = Storage::open(&db_path).unwrap();
    let recovered = restarted.recover().unwrap();
    assert_eq!(recovered, 1);

    let redequeued = restarted.dequeue(Utc::now()).unwrap().unwrap();
    assert_eq!(redequeued.id, job_id);
    assert_eq!(redequeued.attempt, 2);

    restarted
        .complete(job_id, CompleteOutcome::Success { result_json: None, stdout: None }, Utc::now())
        .unwrap();
    let log = restarted.find_job_log(job_id).unwrap().unwrap();
    assert_eq!(log.status, JobStatus::Succeeded);
    assert_eq!(log.attempt, 2);
}
