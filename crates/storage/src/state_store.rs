// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State store operations (spec §4.3): per-plugin state blob and the
//! event-context ("baggage") ledger.

use ductile_core::{context::EventContext, plugin_state::PluginState, EventContextId};
use rusqlite::{params, OptionalExtension};

use crate::connection::Storage;
use crate::error::{Result, StorageError};

impl Storage {
    /// `GetState(plugin)` → empty object if absent (spec §4.3).
    pub fn get_state(&self, plugin: &str) -> Result<PluginState> {
        self.with_conn(|conn| {
            let row: Option<(String, chrono::DateTime<chrono::Utc>)> = conn
                .query_row(
                    "SELECT state, updated_at FROM plugin_state WHERE plugin = ?1",
                    params![plugin],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(match row {
                Some((state, updated_at)) => PluginState {
                    plugin: plugin.to_string(),
                    state: serde_json::from_str(&state)?,
                    updated_at,
                },
                None => PluginState::empty(plugin),
            })
        })
    }

    /// `ApplyUpdates(plugin, updates)` — shallow merge with a 1 MiB ceiling
    /// (spec §3, §4.3). Implicit insert when the plugin has no prior row
    /// (SPEC_FULL.md open-question supplement).
    pub fn apply_plugin_state_updates(
        &self,
        plugin: &str,
        updates: &serde_json::Value,
    ) -> Result<PluginState> {
        self.with_conn(|conn| {
            let mut state = {
                let row: Option<(String, chrono::DateTime<chrono::Utc>)> = conn
                    .query_row(
                        "SELECT state, updated_at FROM plugin_state WHERE plugin = ?1",
                        params![plugin],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                match row {
                    Some((s, updated_at)) => PluginState {
                        plugin: plugin.to_string(),
                        state: serde_json::from_str(&s)?,
                        updated_at,
                    },
                    None => PluginState::empty(plugin),
                }
            };

            state.apply_updates(updates).map_err(StorageError::from)?;

            conn.execute(
                "INSERT INTO plugin_state (plugin, state, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(plugin) DO UPDATE SET state = excluded.state, updated_at = \
                 excluded.updated_at",
                params![plugin, serde_json::to_string(&state.state)?, state.updated_at],
            )?;
            Ok(state)
        })
    }

    /// `GetContext(id)` (spec §4.3).
    pub fn get_context(&self, id: EventContextId) -> Result<EventContext> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, parent_id, pipeline, step_id, baggage, hop_count, created_at \
                 FROM event_context WHERE id = ?1",
                params![id.as_str()],
                row_to_context,
            )
            .optional()?
            .ok_or_else(|| StorageError::ContextNotFound(id.as_str().to_string()))
        })
    }

    /// `AppendContext` (spec §4.3): persist a derived context row. The
    /// caller (the router) computes the merged baggage via
    /// [`EventContext::derive`]; this just durably records the row.
    pub fn append_context(&self, context: &EventContext) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO event_context (id, parent_id, pipeline, step_id, baggage, \
                 hop_count, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    context.id.as_str(),
                    context.parent_id.map(|id| id.as_str().to_string()),
                    context.pipeline,
                    context.step_id,
                    serde_json::to_string(&context.baggage)?,
                    context.hop_count,
                    context.created_at,
                ],
            )?;
            Ok(())
        })
    }
}

fn row_to_context(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventContext> {
    let baggage_raw: String = row.get("baggage")?;
    Ok(EventContext {
        id: EventContextId::from_string(row.get::<_, String>("id")?),
        parent_id: row.get::<_, Option<String>>("parent_id")?.map(EventContextId::from_string),
        pipeline: row.get("pipeline")?,
        step_id: row.get("step_id")?,
        baggage: serde_json::from_str(&baggage_raw).unwrap_or(serde_json::Value::Null),
        hop_count: row.get::<_, i64>("hop_count")? as u32,
        created_at: row.get("created_at")?,
    })
}
