// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {job_id} is in status {actual}, expected {expected}")]
    WrongStatus { job_id: String, expected: String, actual: String },

    #[error("plugin state oversize: {0}")]
    StateOversize(#[from] ductile_core::plugin_state::StateOversizeError),

    #[error("event context {0} not found")]
    ContextNotFound(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
