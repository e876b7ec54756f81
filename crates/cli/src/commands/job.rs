// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ductile job` — inspect the queue and job log directly against storage.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ductile_core::JobId;
use ductile_storage::Storage;
use serde::Serialize;

use crate::output::{print_rows, OutputFormat};

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// List recently completed jobs
    List {
        /// Only jobs for this plugin
        #[arg(long)]
        plugin: Option<String>,
        /// Maximum number of jobs to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show a single job's log entry
    Show {
        /// Job ID
        id: String,
    },
}

#[derive(Serialize)]
struct JobRow {
    id: String,
    plugin: String,
    command: String,
    status: String,
    origin: String,
    attempt: u32,
    completed_at: String,
    last_error: Option<String>,
}

impl From<&ductile_storage::job_log::JobLogEntry> for JobRow {
    fn from(entry: &ductile_storage::job_log::JobLogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            plugin: entry.plugin.clone(),
            command: entry.command.to_string(),
            status: entry.status.to_string(),
            origin: entry.origin.to_string(),
            attempt: entry.attempt,
            completed_at: entry.completed_at.to_rfc3339(),
            last_error: entry.last_error.clone(),
        }
    }
}

pub fn run(storage: &Storage, args: JobArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        JobCommand::List { plugin, limit } => {
            let entries = storage.list_recent_job_log(plugin.as_deref(), limit)?;
            let rows: Vec<JobRow> = entries.iter().map(JobRow::from).collect();
            print_rows(&rows, format, "jobs", |r| {
                format!("{:<36} {:<16} {:<8} {:<10} {}", r.id, r.plugin, r.command, r.status, r.completed_at)
            })
        }
        JobCommand::Show { id } => {
            let job_id = JobId::from_string(id.clone());
            let entry = storage
                .find_job_log(job_id)?
                .with_context(|| format!("no job log entry for {id}"))?;
            let row = JobRow::from(&entry);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&row)?),
                OutputFormat::Text => {
                    println!("id:           {}", row.id);
                    println!("plugin:       {}", row.plugin);
                    println!("command:      {}", row.command);
                    println!("status:       {}", row.status);
                    println!("origin:       {}", row.origin);
                    println!("attempt:      {}", row.attempt);
                    println!("completed at: {}", row.completed_at);
                    if let Some(err) = &row.last_error {
                        println!("last error:   {err}");
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
