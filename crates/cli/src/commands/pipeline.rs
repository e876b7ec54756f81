// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ductile pipeline` — list the pipelines compiled from the configured
//! pipeline directory.

use anyhow::Result;
use clap::{Args, Subcommand};
use ductile_pipelines::dag::PipelineSet;
use serde::Serialize;

use crate::output::{print_rows, OutputFormat};

#[derive(Args)]
pub struct PipelineArgs {
    #[command(subcommand)]
    pub command: PipelineCommand,
}

#[derive(Subcommand)]
pub enum PipelineCommand {
    /// List compiled pipelines
    List,
}

#[derive(Serialize)]
struct PipelineRow {
    name: String,
    id: String,
    trigger: String,
    steps: usize,
}

pub fn run(pipelines: &PipelineSet, args: PipelineArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        PipelineCommand::List => {
            let rows: Vec<PipelineRow> = pipelines
                .iter()
                .map(|p| PipelineRow {
                    name: p.name.clone(),
                    id: p.id.clone(),
                    trigger: p.trigger.clone(),
                    steps: p.entry_units.len(),
                })
                .collect();
            print_rows(&rows, format, "pipelines", |r| {
                format!("{:<24} {:<12} trigger={} steps={}", r.name, r.id, r.trigger, r.steps)
            })
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
