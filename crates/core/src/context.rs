// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The "baggage" ledger (spec §3, §4.3): immutable lineage context threaded
//! through a pipeline chain.

use crate::EventContextId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix marking a baggage key as immutable once set at the root context.
pub const ORIGIN_PREFIX: &str = "origin_";

/// One row in the event-context ledger. Immutable once written (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    pub id: EventContextId,
    pub parent_id: Option<EventContextId>,
    pub pipeline: Option<String>,
    pub step_id: Option<String>,
    pub baggage: Value,
    pub hop_count: u32,
    pub created_at: DateTime<Utc>,
}

impl EventContext {
    /// Create a root context (no parent), hop_count 0.
    pub fn root(baggage: Value) -> Self {
        Self {
            id: EventContextId::new(),
            parent_id: None,
            pipeline: None,
            step_id: None,
            baggage,
            hop_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Merge `updates` into `base` baggage per spec §4.3: `origin_*` keys set
    /// at the root are immutable; any attempt to overwrite one is discarded.
    /// Dropped keys are returned so the caller can log a WARN per key.
    pub fn merge_baggage(base: &Value, updates: &Value) -> (Value, Vec<String>) {
        let mut merged = match base {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let mut rejected = Vec::new();
        if let Value::Object(incoming) = updates {
            for (key, value) in incoming {
                if key.starts_with(ORIGIN_PREFIX) && merged.contains_key(key) {
                    rejected.push(key.clone());
                    continue;
                }
                merged.insert(key.clone(), value.clone());
            }
        }
        (Value::Object(merged), rejected)
    }

    /// Derive a child context from this one, one hop deeper (spec §4.7.1 step 3).
    pub fn derive(
        &self,
        pipeline: impl Into<String>,
        step_id: impl Into<String>,
        event_context_updates: &Value,
    ) -> (Self, Vec<String>) {
        let (baggage, rejected) = Self::merge_baggage(&self.baggage, event_context_updates);
        let child = Self {
            id: EventContextId::new(),
            parent_id: Some(self.id),
            pipeline: Some(pipeline.into()),
            step_id: Some(step_id.into()),
            baggage,
            hop_count: self.hop_count + 1,
            created_at: Utc::now(),
        };
        (child, rejected)
    }
}
