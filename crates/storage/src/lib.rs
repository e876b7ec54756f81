// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ductile-storage: the embedded relational store (spec §4.1), queue
//! (§4.2), state store (§4.3), and circuit-breaker persistence.

pub mod circuit_store;
pub mod connection;
pub mod error;
pub mod job_log;
pub mod queue;
pub mod schedule;
pub mod schema;
pub mod state_store;

pub use connection::Storage;
pub use error::StorageError;
pub use job_log::JobLogEntry;
pub use queue::{DedupeOutcome, EnqueueRequest};
pub use schedule::ScheduleEntryState;
