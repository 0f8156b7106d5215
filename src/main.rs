//! Bomber CLI entry point

use anyhow::{Context, Result};
use bomber::config::toml::merge_cli_with_config;
use bomber::config::{cli::Cli, validator, Config};
use bomber::coordinator::{Dispatcher, ExitWatcher, WatchOutcome};
use bomber::session::loopback::LoopbackSession;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

/// Why the main thread stopped waiting
#[derive(Debug)]
enum ExitReason {
    Signal(&'static str),
    Workers(WatchOutcome),
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = Config::load(&cli.config)?;
    let config = merge_cli_with_config(&cli, config);

    init_tracing(config.runtime.debug);
    tracing::info!("bomber v{}", env!("CARGO_PKG_VERSION"));

    // Also resolves the operation names, so unknown ones fail here
    validator::validate_config(&config).context("Configuration validation failed")?;
    print_configuration(&config);

    if config.runtime.dry_run {
        tracing::info!("dry run mode - configuration validated successfully");
        return Ok(());
    }

    let session = connect(&config)?;
    let dispatcher = Dispatcher::start(&config.workload, config.workers.threads, Arc::new(session))
        .context("Failed to start workers")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let reason = runtime.block_on(wait_for_exit(dispatcher.watcher()));
    // The exit watcher may still be blocked on its channel
    runtime.shutdown_background();

    match reason? {
        ExitReason::Signal(name) => tracing::info!(signal = name, "received signal, stopping"),
        ExitReason::Workers(WatchOutcome::AllFinished) => tracing::info!("all workers finished"),
        ExitReason::Workers(WatchOutcome::WorkerFailed(index)) => {
            tracing::error!(worker = index, "worker failed, stopping")
        }
    }

    let report = dispatcher.shutdown().context("Load generation failed")?;
    tracing::info!(
        workers = report.workers_joined(),
        rounds = report.total_rounds(),
        "shutdown complete"
    );
    Ok(())
}

/// Install the fmt subscriber; `RUST_LOG` overrides the default filter
fn init_tracing(debug: bool) {
    let default = if debug { "bomber=debug" } else { "bomber=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_thread_names(true)
        .init();
}

fn print_configuration(config: &Config) {
    for line in config.to_string().lines() {
        tracing::info!("{}", line);
    }
}

/// Build the session and register every remote
fn connect(config: &Config) -> Result<LoopbackSession> {
    let mut session =
        LoopbackSession::new(&config.loopback).context("Failed to create loopback session")?;

    for remote in &config.cluster.remotes {
        tracing::info!(remote = %remote, "creating address");
        tracing::info!(remote = %remote, "connecting");
        session
            .add_remote(remote)
            .with_context(|| format!("Failed to connect to {}", remote))?;
        tracing::info!(remote = %remote, "connected");
    }

    session.set_groups(config.cluster.groups.clone());
    session.set_namespace(config.cluster.namespace.clone());
    Ok(session)
}

/// Wait for SIGTERM, SIGINT, or the worker pool needing attention
async fn wait_for_exit(mut watcher: ExitWatcher) -> Result<ExitReason> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let workers = tokio::task::spawn_blocking(move || watcher.wait());

    tokio::select! {
        _ = sigterm.recv() => Ok(ExitReason::Signal("SIGTERM")),
        interrupted = tokio::signal::ctrl_c() => {
            interrupted.context("Failed to listen for SIGINT")?;
            Ok(ExitReason::Signal("SIGINT"))
        }
        outcome = workers => Ok(ExitReason::Workers(outcome.context("Exit watcher failed")?)),
    }
}
