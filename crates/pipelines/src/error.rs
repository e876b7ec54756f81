// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline cycle detected: {0}")]
    Cycle(String),

    #[error("pipeline {pipeline} step {step} calls unknown pipeline {called}")]
    UnknownCall { pipeline: String, step: String, called: String },

    #[error("pipeline {pipeline} step {step} uses unknown plugin {plugin}")]
    UnknownPlugin { pipeline: String, step: String, plugin: String },

    #[error("pipeline {pipeline} step {step} has malformed uses reference {raw:?}")]
    MalformedUses { pipeline: String, step: String, raw: String },

    #[error("duplicate pipeline name {0}")]
    DuplicateName(String),

    #[error(transparent)]
    Storage(#[from] ductile_storage::StorageError),

    #[error(transparent)]
    Workspace(#[from] ductile_workspace::WorkspaceError),
}
