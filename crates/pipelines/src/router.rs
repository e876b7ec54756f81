// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event router (spec §4.7.1): matches emitted events against compiled
//! pipelines, derives baggage, clones workspaces, and enqueues downstream
//! jobs. Failure to enqueue a downstream job never unwinds the source job's
//! own completion (spec §4.7.1, last paragraph).

use chrono::{DateTime, Utc};
use ductile_core::context::EventContext;
use ductile_core::{EventContextId, JobCommand, JobId, JobOrigin, WorkspaceId};
use ductile_storage::queue::EnqueueRequest;
use ductile_storage::{DedupeOutcome, Storage};
use ductile_wire::PluginEvent;
use ductile_workspace::WorkspaceManager;

use crate::dag::{DispatchUnit, PipelineSet};
use crate::error::PipelineError;

/// Well-known payload keys auto-propagated to downstream jobs (spec §4.7.1).
const AUTO_PROPAGATED_KEYS: &[&str] =
    &["pattern", "prompt", "model", "output_dir", "output_path", "filename"];

/// Default hop-count ceiling before a chain is aborted (spec §3).
pub const DEFAULT_HOP_LIMIT: u32 = 20;

/// The minimal facts about the job that just emitted an event, as needed by
/// the router. Deliberately narrower than `Job` so the router doesn't need
/// to re-fetch the row it was just handed by the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct RouteSource {
    pub job_id: JobId,
    pub event_context_id: Option<EventContextId>,
    pub workspace_id: Option<WorkspaceId>,
}

#[derive(Debug, Clone)]
pub enum RouteOutcome {
    NoMatchingPipeline,
    HopLimitExceeded { pipeline: String },
    Routed { pipeline_id: String, enqueued: Vec<JobId> },
}

pub struct Router<'a> {
    pipelines: &'a PipelineSet,
    storage: &'a Storage,
    workspaces: &'a WorkspaceManager,
    hop_limit: u32,
}

impl<'a> Router<'a> {
    pub fn new(pipelines: &'a PipelineSet, storage: &'a Storage, workspaces: &'a WorkspaceManager) -> Self {
        Self { pipelines, storage, workspaces, hop_limit: DEFAULT_HOP_LIMIT }
    }

    pub fn with_hop_limit(mut self, hop_limit: u32) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn route(
        &self,
        source: &RouteSource,
        event: &PluginEvent,
        now: DateTime<Utc>,
    ) -> Result<RouteOutcome, PipelineError> {
        let Some(pipeline) = self.pipelines.matching(&event.event_type) else {
            return Ok(RouteOutcome::NoMatchingPipeline);
        };

        let parent_context = match source.event_context_id {
            Some(id) => Some(self.storage.get_context(id)?),
            None => None,
        };

        let base_baggage =
            parent_context.as_ref().map(|c| c.baggage.clone()).unwrap_or(serde_json::json!({}));
        let (baggage, rejected) = EventContext::merge_baggage(&base_baggage, &event.payload);
        for key in &rejected {
            tracing::warn!(
                pipeline = %pipeline.name,
                key,
                "rejected attempt to overwrite an immutable origin_ key"
            );
        }

        let hop_count = parent_context.as_ref().map(|c| c.hop_count + 1).unwrap_or(1);
        if hop_count > self.hop_limit {
            tracing::error!(
                pipeline = %pipeline.name,
                hop_count,
                limit = self.hop_limit,
                "hop count limit exceeded, aborting chain"
            );
            return Ok(RouteOutcome::HopLimitExceeded { pipeline: pipeline.name.clone() });
        }

        let context = EventContext {
            id: EventContextId::new(),
            parent_id: parent_context.as_ref().map(|c| c.id),
            pipeline: Some(pipeline.name.clone()),
            step_id: None,
            baggage,
            hop_count,
            created_at: now,
        };
        self.storage.append_context(&context)?;

        let event_id = uuid::Uuid::new_v4();
        let mut enqueued = Vec::new();
        for unit in &pipeline.entry_units {
            match self.dispatch_unit(source, context.id, event_id, unit, &event.payload, now) {
                Ok(job_id) => enqueued.push(job_id),
                Err(err) => tracing::error!(
                    pipeline = %pipeline.name,
                    step = %unit.step_id,
                    error = %err,
                    "failed to enqueue downstream job; source job remains successful"
                ),
            }
        }

        Ok(RouteOutcome::Routed { pipeline_id: pipeline.id.clone(), enqueued })
    }

    fn dispatch_unit(
        &self,
        source: &RouteSource,
        context_id: EventContextId,
        event_id: uuid::Uuid,
        unit: &DispatchUnit,
        event_payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<JobId, PipelineError> {
        let child_workspace = WorkspaceId::new();
        match source.workspace_id {
            Some(parent_ws) => {
                self.workspaces.clone_workspace(parent_ws, child_workspace)?;
            }
            None => {
                self.workspaces.create(child_workspace)?;
            }
        }

        let req = EnqueueRequest {
            plugin: unit.plugin.clone(),
            command: parse_command(&unit.command),
            payload: propagate_well_known_keys(event_payload),
            origin: JobOrigin::Route,
            max_attempts: 5,
            dedupe_key: None,
            dedupe_ttl: chrono::Duration::hours(24),
            parent_job_id: Some(source.job_id),
            source_event_id: Some(event_id),
            event_context_id: Some(context_id),
            workspace_id: Some(child_workspace),
        };

        match self.storage.enqueue(req, now)? {
            DedupeOutcome::Created(job) => Ok(job.id),
            DedupeOutcome::Dropped { existing_job_id } => Ok(existing_job_id),
        }
    }
}

fn parse_command(s: &str) -> JobCommand {
    match s {
        "poll" => JobCommand::Poll,
        "health" => JobCommand::Health,
        "init" => JobCommand::Init,
        _ => JobCommand::Handle,
    }
}

fn propagate_well_known_keys(event_payload: &serde_json::Value) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    if let serde_json::Value::Object(map) = event_payload {
        for key in AUTO_PROPAGATED_KEYS {
            if let Some(value) = map.get(*key) {
                out.insert((*key).to_string(), value.clone());
            }
        }
    }
    serde_json::Value::Object(out)
}
