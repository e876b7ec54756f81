// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace {0} does not exist")]
    NotFound(String),

    #[error("io error cloning workspace: {0}")]
    Io(#[from] std::io::Error),
}
