// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_job_starts_queued_with_attempt_one() {
    let job = Job::new("echo", JobCommand::Poll, JobOrigin::Scheduler);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempt, 1);
    assert!(job.parent_job_id.is_none());
}

#[test]
fn terminal_statuses_are_recognized() {
    assert!(JobStatus::Succeeded.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(JobStatus::Dead.is_terminal());
    assert!(JobStatus::TimedOut.is_terminal());
    assert!(!JobStatus::Queued.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
}

#[test]
fn health_is_read_by_default_all_else_write() {
    assert!(JobCommand::Health.is_read_by_default());
    assert!(!JobCommand::Poll.is_read_by_default());
    assert!(!JobCommand::Handle.is_read_by_default());
    assert!(!JobCommand::Init.is_read_by_default());
}

#[test]
fn dequeued_projection_carries_lineage_fields() {
    let parent = JobId::new();
    let ctx = EventContextId::new();
    let job = Job::new("echo", JobCommand::Handle, JobOrigin::Route)
        .parent_job_id(parent)
        .event_context_id(ctx);
    let projection = DequeuedJob::from(&job);
    assert_eq!(projection.event_context_id, Some(ctx));
    assert_eq!(job.parent_job_id, Some(parent));
}

#[test]
fn command_display_matches_wire_strings() {
    assert_eq!(JobCommand::Poll.to_string(), "poll");
    assert_eq!(JobCommand::Handle.to_string(), "handle");
    assert_eq!(JobCommand::Health.to_string(), "health");
    assert_eq!(JobCommand::Init.to_string(), "init");
}
