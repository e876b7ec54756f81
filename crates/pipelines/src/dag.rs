// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline DAG compilation (spec §4.7.1): flatten `call` references at
//! compile time, detect cycles via DFS, derive a stable BLAKE3 identifier.

use std::collections::HashSet;

use ductile_plugins::PluginRegistry;
use ductile_wire::{PipelineManifest, PipelineStep};
use indexmap::IndexMap;

use crate::error::PipelineError;

/// A single plugin+command invocation a router enqueues (spec §4.7.1 item 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchUnit {
    pub step_id: String,
    pub plugin: String,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    pub name: String,
    /// BLAKE3-derived stable identifier for versioning (spec §4.7.1).
    pub id: String,
    pub trigger: String,
    pub entry_units: Vec<DispatchUnit>,
}

/// All pipelines compiled at startup, indexed by trigger event name for
/// O(1) router lookup. Read-mostly; rebuilt and swapped atomically on reload
/// (spec §5).
#[derive(Debug, Clone, Default)]
pub struct PipelineSet {
    by_trigger: IndexMap<String, CompiledPipeline>,
}

impl PipelineSet {
    pub fn compile(
        manifests: &[PipelineManifest],
        registry: &PluginRegistry,
    ) -> Result<Self, PipelineError> {
        let mut by_name: IndexMap<&str, &PipelineManifest> = IndexMap::new();
        for manifest in manifests {
            if by_name.insert(&manifest.name, manifest).is_some() {
                return Err(PipelineError::DuplicateName(manifest.name.clone()));
            }
        }

        let mut by_trigger = IndexMap::new();
        for manifest in manifests {
            let mut visiting = HashSet::new();
            let entry_units =
                flatten(manifest, &manifest.steps, &by_name, &mut visiting, registry)?;
            let id = pipeline_identifier(manifest);
            by_trigger.insert(
                manifest.trigger.clone(),
                CompiledPipeline {
                    name: manifest.name.clone(),
                    id,
                    trigger: manifest.trigger.clone(),
                    entry_units,
                },
            );
        }
        Ok(Self { by_trigger })
    }

    pub fn matching(&self, event_type: &str) -> Option<&CompiledPipeline> {
        self.by_trigger.get(event_type)
    }

    pub fn len(&self) -> usize {
        self.by_trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_trigger.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledPipeline> {
        self.by_trigger.values()
    }
}

fn flatten(
    root: &PipelineManifest,
    steps: &[PipelineStep],
    by_name: &IndexMap<&str, &PipelineManifest>,
    visiting: &mut HashSet<String>,
    registry: &PluginRegistry,
) -> Result<Vec<DispatchUnit>, PipelineError> {
    let mut units = Vec::new();
    for step in steps {
        match step {
            PipelineStep::Uses { id, uses } => {
                let (plugin, command) = uses.split_once('.').ok_or_else(|| {
                    PipelineError::MalformedUses {
                        pipeline: root.name.clone(),
                        step: id.clone(),
                        raw: uses.clone(),
                    }
                })?;
                if registry.get(plugin).is_none() {
                    return Err(PipelineError::UnknownPlugin {
                        pipeline: root.name.clone(),
                        step: id.clone(),
                        plugin: plugin.to_string(),
                    });
                }
                units.push(DispatchUnit {
                    step_id: id.clone(),
                    plugin: plugin.to_string(),
                    command: command.to_string(),
                });
            }
            PipelineStep::Call { id, call } => {
                if !visiting.insert(call.clone()) {
                    return Err(PipelineError::Cycle(format!(
                        "{} -> {} -> ... -> {}",
                        root.name, id, call
                    )));
                }
                let called = by_name.get(call.as_str()).ok_or_else(|| {
                    PipelineError::UnknownCall {
                        pipeline: root.name.clone(),
                        step: id.clone(),
                        called: call.clone(),
                    }
                })?;
                let mut nested = flatten(called, &called.steps, by_name, visiting, registry)?;
                visiting.remove(call);
                units.append(&mut nested);
            }
            PipelineStep::Split { split, .. } => {
                let mut nested = flatten(root, split, by_name, visiting, registry)?;
                units.append(&mut nested);
            }
        }
    }
    Ok(units)
}

fn pipeline_identifier(manifest: &PipelineManifest) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(manifest.name.as_bytes());
    hasher.update(b"\0");
    hasher.update(manifest.trigger.as_bytes());
    for step in &manifest.steps {
        hasher.update(step.id().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
