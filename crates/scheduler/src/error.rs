// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown schedule interval {0:?}; expected one of 5m, 15m, 30m, hourly, 2h, 6h, daily, weekly, monthly")]
    UnknownInterval(String),

    #[error("malformed preferred_window time {0:?}, expected HH:MM")]
    MalformedWindow(String),

    #[error(transparent)]
    Storage(#[from] ductile_storage::StorageError),

    #[error(transparent)]
    Workspace(#[from] ductile_workspace::WorkspaceError),
}
