// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-plugin JSON state blob with shallow-merge semantics (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Size ceiling for a plugin's serialized state blob.
pub const STATE_SIZE_CEILING_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginState {
    pub plugin: String,
    pub state: Value,
    pub updated_at: DateTime<Utc>,
}

impl PluginState {
    pub fn empty(plugin: impl Into<String>) -> Self {
        Self { plugin: plugin.into(), state: Value::Object(Map::new()), updated_at: Utc::now() }
    }

    /// Shallow-merge `updates` into the current state: top-level keys in
    /// `updates` replace the stored blob's keys; nested objects are
    /// wholesale-replaced, never deep-merged. Rejects if the merged blob
    /// would exceed [`STATE_SIZE_CEILING_BYTES`].
    pub fn apply_updates(&mut self, updates: &Value) -> Result<(), StateOversizeError> {
        let mut merged = match &self.state {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Value::Object(incoming) = updates {
            for (key, value) in incoming {
                merged.insert(key.clone(), value.clone());
            }
        }
        let candidate = Value::Object(merged);
        let size = serde_json::to_vec(&candidate).map(|v| v.len()).unwrap_or(usize::MAX);
        if size > STATE_SIZE_CEILING_BYTES {
            return Err(StateOversizeError { size, ceiling: STATE_SIZE_CEILING_BYTES });
        }
        self.state = candidate;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("plugin state would be {size} bytes, exceeding the {ceiling}-byte ceiling")]
pub struct StateOversizeError {
    pub size: usize,
    pub ceiling: usize,
}
