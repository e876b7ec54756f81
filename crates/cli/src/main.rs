// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ductile` — read-only operational CLI over the daemon's state directory.

use anyhow::Result;
use clap::{Parser, Subcommand};

use ductile_cli::commands::{job, pipeline, status};
use ductile_cli::output::OutputFormat;
use ductile_daemon::config::{state_dir, DaemonConfig};
use ductile_daemon::lifecycle::load_pipeline_manifests;
use ductile_pipelines::dag::PipelineSet;
use ductile_plugins::PluginRegistry;
use ductile_storage::Storage;

#[derive(Parser)]
#[command(name = "ductile", version, about = "Inspect the Ductile execution substrate")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon and plugin status overview
    Status,
    /// Inspect the job queue and job log
    Job(job::JobArgs),
    /// Inspect compiled pipelines
    Pipeline(pipeline::PipelineArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dir = state_dir()?;
    let config = DaemonConfig::load(dir)?;
    let storage = Storage::open(&config.db_path)?;
    let registry = PluginRegistry::discover(&config.plugin_roots);

    match cli.command {
        Command::Status => status::run(&config, &storage, &registry, cli.format),
        Command::Job(args) => job::run(&storage, args, cli.format),
        Command::Pipeline(args) => {
            let pipeline_manifests = load_pipeline_manifests(&config.pipeline_dir)?;
            let pipelines = PipelineSet::compile(&pipeline_manifests, &registry)?;
            pipeline::run(&pipelines, args, cli.format)
        }
    }
}
