// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ductile status` — daemon lock state, circuit breakers, schedule entries.

use anyhow::Result;
use serde::Serialize;

use ductile_daemon::config::DaemonConfig;
use ductile_plugins::PluginRegistry;
use ductile_storage::Storage;

use crate::output::OutputFormat;

#[derive(Serialize)]
struct StatusReport {
    running: bool,
    plugin_count: usize,
    plugins: Vec<PluginStatus>,
}

#[derive(Serialize)]
struct PluginStatus {
    name: String,
    scheduled: bool,
    next_run_at: Option<String>,
    circuit_state: String,
}

pub fn run(config: &DaemonConfig, storage: &Storage, registry: &PluginRegistry, format: OutputFormat) -> Result<()> {
    let running = std::fs::read_to_string(&config.lock_path).map(|s| !s.trim().is_empty()).unwrap_or(false);

    let mut plugins = Vec::new();
    for plugin in registry.iter() {
        let schedule_entry = storage.get_schedule_entry(&plugin.manifest.name)?;
        let circuit = storage.get_circuit(&plugin.manifest.name, "poll")?;
        plugins.push(PluginStatus {
            name: plugin.manifest.name.clone(),
            scheduled: plugin.manifest.schedule.is_some(),
            next_run_at: schedule_entry.next_run_at.map(|t| t.to_rfc3339()),
            circuit_state: circuit.state.to_string(),
        });
    }

    let report = StatusReport { running, plugin_count: plugins.len(), plugins };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("ductiled: {}", if report.running { "running" } else { "not running" });
            println!("plugins: {}", report.plugin_count);
            for p in &report.plugins {
                let next = p.next_run_at.as_deref().unwrap_or("-");
                println!("  {:<20} scheduled={:<5} circuit={:<10} next_run={}", p.name, p.scheduled, p.circuit_state, next);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
