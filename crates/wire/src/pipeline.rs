// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk pipeline DAG definitions (spec §4.7.1).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineStep {
    Uses { id: String, uses: String },
    Call { id: String, call: String },
    Split { id: String, split: Vec<PipelineStep> },
}

impl PipelineStep {
    pub fn id(&self) -> &str {
        match self {
            PipelineStep::Uses { id, .. } => id,
            PipelineStep::Call { id, .. } => id,
            PipelineStep::Split { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineManifest {
    pub name: String,
    pub trigger: String,
    pub steps: Vec<PipelineStep>,
}

impl PipelineManifest {
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
