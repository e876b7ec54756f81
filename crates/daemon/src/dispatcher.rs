// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The serial dispatcher (spec §4.7): dequeue, build the request envelope,
//! spawn the plugin, apply results, route emitted events. Single worker —
//! no concurrent subprocess invocations (spec §5).

use chrono::Utc;
use ductile_core::circuit::CircuitBreaker;
use ductile_core::JobCommand;
use ductile_pipelines::dag::PipelineSet;
use ductile_pipelines::router::{RouteOutcome, RouteSource, Router};
use ductile_plugins::{PluginRegistry, PluginRunner};
use ductile_storage::queue::CompleteOutcome;
use ductile_storage::Storage;
use ductile_wire::envelope::LATEST_PROTOCOL_VERSION;
use ductile_wire::RequestEnvelope;
use ductile_workspace::WorkspaceManager;
use serde_json::Value;

use crate::config::Deadlines;
use crate::error::DaemonError;
use crate::hub::{EventHub, LifecycleEvent};

pub struct Dispatcher<'a> {
    storage: &'a Storage,
    workspaces: &'a WorkspaceManager,
    registry: &'a PluginRegistry,
    pipelines: &'a PipelineSet,
    runner: PluginRunner,
    hub: &'a EventHub,
    deadlines: Deadlines,
    env_passthrough: Vec<String>,
    plugin_config: std::collections::HashMap<String, Value>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        storage: &'a Storage,
        workspaces: &'a WorkspaceManager,
        registry: &'a PluginRegistry,
        pipelines: &'a PipelineSet,
        hub: &'a EventHub,
        deadlines: Deadlines,
        env_passthrough: Vec<String>,
    ) -> Self {
        Self {
            storage,
            workspaces,
            registry,
            pipelines,
            runner: PluginRunner::new(),
            hub,
            deadlines,
            env_passthrough,
            plugin_config: std::collections::HashMap::new(),
        }
    }

    pub fn with_plugin_config(mut self, config: std::collections::HashMap<String, Value>) -> Self {
        self.plugin_config = config;
        self
    }

    /// Dequeue and fully process at most one job. Returns `false` when the
    /// queue has nothing runnable, so callers can back off between ticks.
    pub async fn dispatch_once(&self) -> Result<bool, DaemonError> {
        let now = Utc::now();
        let Some(job) = self.storage.dequeue(now)? else {
            return Ok(false);
        };

        self.hub.publish(LifecycleEvent::JobDequeued {
            job_id: job.id,
            plugin: job.plugin.clone(),
            command: job.command.to_string(),
            at: now,
        });

        let Some(plugin) = self.registry.get(&job.plugin) else {
            tracing::error!(job_id = %job.id, plugin = %job.plugin, "dequeued job for unregistered plugin");
            self.storage.complete(
                job.id,
                CompleteOutcome::Failure {
                    retryable: false,
                    error: format!("unknown plugin {:?}", job.plugin),
                    stderr: None,
                    stdout: None,
                },
                Utc::now(),
            )?;
            return Ok(true);
        };

        let state = self.storage.get_state(&job.plugin)?;
        let context = match job.event_context_id {
            Some(id) => Some(self.storage.get_context(id)?),
            None => None,
        };
        let workspace_dir = match job.workspace_id {
            Some(id) => Some(self.workspaces.open(id)?),
            None => None,
        };

        let config = self.plugin_config.get(&job.plugin).cloned().unwrap_or_else(|| serde_json::json!({}));
        let protocol = plugin.manifest.protocol.min(LATEST_PROTOCOL_VERSION);
        let deadline = self.deadlines.for_command(job.command);
        let deadline_at = Utc::now() + chrono::Duration::from_std(deadline).unwrap_or(chrono::Duration::seconds(60));

        let request = RequestEnvelope {
            protocol,
            job_id: job.id.as_str().to_string(),
            command: job.command.to_string(),
            config,
            state: state.state,
            context: if protocol >= 2 { context.as_ref().map(|c| c.baggage.clone()) } else { None },
            workspace_dir: if protocol >= 2 {
                workspace_dir.as_ref().and_then(|p| p.to_str().map(str::to_string))
            } else {
                None
            },
            event: if job.command == JobCommand::Handle { Some(job.payload.clone()) } else { None },
            deadline_at,
        };

        let outcome = self.runner.run(plugin, &request, deadline, &self.env_passthrough).await?;

        let mut circuit = self.storage.get_circuit(&job.plugin, &job.command.to_string())?;

        if outcome.timed_out {
            self.storage.complete(
                job.id,
                CompleteOutcome::TimedOut { error: "deadline exceeded".to_string() },
                Utc::now(),
            )?;
            self.record_circuit_outcome(&mut circuit, &job.plugin, &job.command.to_string(), false, job.id);
            self.hub.publish(LifecycleEvent::JobTimedOut { job_id: job.id, at: Utc::now() });
            return Ok(true);
        }

        let Some(response) = outcome.response else {
            self.storage.complete(
                job.id,
                CompleteOutcome::Failure {
                    retryable: outcome.retryable(),
                    error: "plugin produced no parseable response".to_string(),
                    stderr: Some(outcome.stderr),
                    stdout: Some(outcome.stdout),
                },
                Utc::now(),
            )?;
            self.record_circuit_outcome(&mut circuit, &job.plugin, &job.command.to_string(), false, job.id);
            self.hub.publish(LifecycleEvent::JobFailed {
                job_id: job.id,
                retryable: outcome.retryable(),
                error: "no parseable response".to_string(),
                at: Utc::now(),
            });
            return Ok(true);
        };

        if !response.state_updates.is_null() {
            if let Err(err) = self.storage.apply_plugin_state_updates(&job.plugin, &response.state_updates) {
                tracing::warn!(job_id = %job.id, error = %err, "dropping oversize state_updates");
            }
        }

        for log in &response.logs {
            match log.level {
                ductile_wire::LogLevel::Info => tracing::info!(job_id = %job.id, plugin = %job.plugin, "{}", log.message),
                ductile_wire::LogLevel::Warn => tracing::warn!(job_id = %job.id, plugin = %job.plugin, "{}", log.message),
                ductile_wire::LogLevel::Error => tracing::error!(job_id = %job.id, plugin = %job.plugin, "{}", log.message),
            }
        }

        let is_ok = matches!(response.status, ductile_wire::envelope::ResponseStatus::Ok);
        let outcome_for_complete = if is_ok {
            CompleteOutcome::Success { result_json: None, stdout: Some(outcome.stdout.clone()) }
        } else {
            CompleteOutcome::Failure {
                retryable: outcome.retryable(),
                error: response.error.clone().unwrap_or_else(|| "plugin reported error".to_string()),
                stderr: Some(outcome.stderr.clone()),
                stdout: Some(outcome.stdout.clone()),
            }
        };
        self.storage.complete(job.id, outcome_for_complete, Utc::now())?;
        self.record_circuit_outcome(&mut circuit, &job.plugin, &job.command.to_string(), is_ok, job.id);

        if is_ok {
            self.hub.publish(LifecycleEvent::JobSucceeded { job_id: job.id, at: Utc::now() });
        } else {
            self.hub.publish(LifecycleEvent::JobFailed {
                job_id: job.id,
                retryable: outcome.retryable(),
                error: response.error.clone().unwrap_or_default(),
                at: Utc::now(),
            });
        }

        let router = Router::new(self.pipelines, self.storage, self.workspaces);
        let source = RouteSource { job_id: job.id, event_context_id: job.event_context_id, workspace_id: job.workspace_id };
        for event in &response.events {
            match router.route(&source, event, Utc::now()) {
                Ok(RouteOutcome::Routed { enqueued, .. }) => {
                    tracing::debug!(job_id = %job.id, event = %event.event_type, routed = enqueued.len(), "routed emitted event");
                }
                Ok(RouteOutcome::NoMatchingPipeline) => {}
                Ok(RouteOutcome::HopLimitExceeded { pipeline }) => {
                    tracing::error!(job_id = %job.id, pipeline, "hop limit exceeded, chain aborted");
                }
                Err(err) => {
                    // Router failures never unwind the job's own completion
                    // (spec §4.7.1, last paragraph).
                    tracing::error!(job_id = %job.id, event = %event.event_type, error = %err, "failed to route emitted event");
                }
            }
        }

        Ok(true)
    }

    /// Only scheduler-originated `poll` dispatches feed the circuit breaker
    /// (spec §3: "applies only to scheduler-originated poll jobs").
    fn record_circuit_outcome(
        &self,
        circuit: &mut CircuitBreaker,
        plugin: &str,
        command: &str,
        succeeded: bool,
        job_id: ductile_core::JobId,
    ) {
        let was_open = circuit.state == ductile_core::circuit::CircuitState::Open;
        if succeeded {
            circuit.record_success();
        } else {
            circuit.record_failure(Utc::now(), job_id);
        }
        if let Err(err) = self.storage.put_circuit(circuit) {
            tracing::error!(plugin, command, error = %err, "failed to persist circuit breaker state");
            return;
        }
        let now_open = circuit.state == ductile_core::circuit::CircuitState::Open;
        if now_open && !was_open {
            self.hub.publish(LifecycleEvent::CircuitOpened {
                plugin: plugin.to_string(),
                command: command.to_string(),
                at: Utc::now(),
            });
        } else if was_open && !now_open {
            self.hub.publish(LifecycleEvent::CircuitClosed {
                plugin: plugin.to_string(),
                command: command.to_string(),
                at: Utc::now(),
            });
        }
    }
}
