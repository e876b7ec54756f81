// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ductile-scheduler: fuzzy-interval schedule evaluation, the poll guard, and
//! the per-tick orchestration loop (spec §4.6).

pub mod error;
pub mod interval;
pub mod poll_guard;
pub mod tick;

pub use error::SchedulerError;
pub use interval::{compute_next_run, named_interval, DEFAULT_JITTER_FRACTION};
pub use poll_guard::PollGuard;
pub use tick::Scheduler;
