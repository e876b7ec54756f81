// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error kinds small enough to not warrant their own crate-local enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("plugin state oversize: {0}")]
    StateOversize(#[from] crate::plugin_state::StateOversizeError),

    #[error("hop count {hop_count} exceeds limit {limit}")]
    HopLimitExceeded { hop_count: u32, limit: u32 },
}
