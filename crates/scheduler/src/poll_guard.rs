// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The poll guard (spec §4.6.2): caps outstanding scheduler-originated
//! `poll` jobs per plugin.

use ductile_storage::Storage;

use crate::error::SchedulerError;

/// Default ceiling on concurrently outstanding `poll` jobs per plugin (spec
/// §4.6.2).
pub const DEFAULT_MAX_OUTSTANDING_POLLS: u32 = 1;

pub struct PollGuard<'a> {
    storage: &'a Storage,
    max_outstanding: u32,
}

impl<'a> PollGuard<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage, max_outstanding: DEFAULT_MAX_OUTSTANDING_POLLS }
    }

    pub fn with_max_outstanding(mut self, max_outstanding: u32) -> Self {
        self.max_outstanding = max_outstanding;
        self
    }

    /// Whether the scheduler may enqueue a new `poll` job for `plugin`.
    pub fn permits(&self, plugin: &str) -> Result<bool, SchedulerError> {
        let outstanding = self.storage.count_outstanding_polls(plugin)?;
        Ok(outstanding < self.max_outstanding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ductile_core::{JobCommand, JobOrigin};
    use ductile_storage::EnqueueRequest;

    #[test]
    fn permits_when_no_polls_outstanding() {
        let storage = Storage::open_in_memory().unwrap();
        let guard = PollGuard::new(&storage);
        assert!(guard.permits("echo").unwrap());
    }

    #[test]
    fn blocks_when_at_the_default_ceiling() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .enqueue(
                EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler),
                chrono::Utc::now(),
            )
            .unwrap();
        let guard = PollGuard::new(&storage);
        assert!(!guard.permits("echo").unwrap());
    }

    #[test]
    fn a_higher_ceiling_allows_more_outstanding_polls() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .enqueue(
                EnqueueRequest::new("echo", JobCommand::Poll, JobOrigin::Scheduler),
                chrono::Utc::now(),
            )
            .unwrap();
        let guard = PollGuard::new(&storage).with_max_outstanding(2);
        assert!(guard.permits("echo").unwrap());
    }
}
