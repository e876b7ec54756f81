// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process lifecycle event hub (spec §5: "an event hub broadcasts
//! lifecycle events to SSE subscribers"). The SSE/HTTP surface itself is out
//! of scope; this is the broadcast backbone a surface would sit on top of.

use chrono::{DateTime, Utc};
use ductile_core::JobId;
use tokio::sync::broadcast;

/// Bounded per-subscriber buffer; a subscriber that falls this far behind is
/// dropped rather than slowing down the dispatcher (spec §5 suspension
/// points: "slow subscribers are dropped when their buffer overflows").
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    JobDequeued { job_id: JobId, plugin: String, command: String, at: DateTime<Utc> },
    JobSucceeded { job_id: JobId, at: DateTime<Utc> },
    JobFailed { job_id: JobId, retryable: bool, error: String, at: DateTime<Utc> },
    JobTimedOut { job_id: JobId, at: DateTime<Utc> },
    CircuitOpened { plugin: String, command: String, at: DateTime<Utc> },
    CircuitClosed { plugin: String, command: String, at: DateTime<Utc> },
}

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Publish a lifecycle event. No receivers is not an error; a receiver
    /// that lagged past the buffer silently misses events rather than
    /// blocking the dispatcher.
    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
