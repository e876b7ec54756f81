// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ductiled` — the background process that owns the job queue and
//! dispatches plugin subprocesses (spec §4.6, §4.7).

use ductile_core::SystemClock;
use ductile_daemon::config::{state_dir, DaemonConfig};
use ductile_daemon::dispatcher::Dispatcher;
use ductile_daemon::error::DaemonError;
use ductile_daemon::lifecycle::Daemon;
use ductile_scheduler::Scheduler;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("ductiled {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("ductiled {}", env!("CARGO_PKG_VERSION"));
                println!("Background execution substrate for Ductile plugins.");
                println!("Typically started by the `ductile` CLI, not invoked directly.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("usage: ductiled [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let dir = state_dir()?;
    let config = DaemonConfig::load(dir)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting ductiled");

    let daemon = match Daemon::startup(config).await {
        Ok(d) => d,
        Err(DaemonError::LockFailed(path)) => {
            let pid = std::fs::read_to_string(&path).unwrap_or_default();
            eprintln!("ductiled is already running");
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(err) => {
            error!(error = %err, "failed to start ductiled");
            return Err(err.into());
        }
    };

    let clock = SystemClock;
    let scheduler = Scheduler::new(&daemon.storage, &daemon.workspaces, &clock)
        .with_max_outstanding_polls(daemon.config.max_outstanding_polls)
        .with_retention(daemon.config.job_log_retention);
    let dispatcher = Dispatcher::new(
        &daemon.storage,
        &daemon.workspaces,
        &daemon.registry,
        &daemon.pipelines,
        &daemon.hub,
        daemon.config.deadlines,
        daemon.config.env_passthrough.clone(),
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut tick_timer = tokio::time::interval(daemon.config.tick_interval);
    let mut first_tick = true;

    println!("READY");
    info!(state_dir = %daemon.config.state_dir.display(), "ductiled ready");

    loop {
        tokio::select! {
            _ = tick_timer.tick() => {
                let manifests = daemon.scheduled_manifests();
                match scheduler.tick(&manifests, first_tick) {
                    Ok(report) => {
                        if report.recovered > 0 {
                            info!(recovered = report.recovered, "recovered orphaned jobs");
                        }
                        if !report.enqueued.is_empty() {
                            info!(count = report.enqueued.len(), "scheduled poll jobs enqueued");
                        }
                    }
                    Err(err) => error!(error = %err, "scheduler tick failed"),
                }
                first_tick = false;

                loop {
                    match dispatcher.dispatch_once().await {
                        Ok(true) => continue,
                        Ok(false) => break,
                        Err(err) => {
                            error!(error = %err, "dispatch failed");
                            break;
                        }
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    info!("ductiled stopped");
    Ok(())
}

fn setup_logging(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "ductiled.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
