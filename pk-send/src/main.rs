//! pk-send - Background daemon for scheduled jobs
//!
//! Polls the job store and publishes every ready job whose scheduled time
//! has passed to the configured destinations.

use clap::Parser;
use libpostkeeper::destinations::DestinationRegistry;
use libpostkeeper::logging::{self, LoggingConfig};
use libpostkeeper::{Config, JobManager, PostkeeperError, Scheduler};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pk-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
pk-send - Background daemon for scheduled posting

DESCRIPTION:
    pk-send is a long-running daemon that watches the Postkeeper job store
    and publishes ready jobs once their scheduled time has passed.

    Each due job is claimed, posted to every destination that has a caption
    in its post.yaml, and then marked posted (at least one destination
    succeeded) or failed (none did). Posted job folders are renamed to
    end in _posted.

USAGE:
    # Run in foreground (logs to stderr)
    pk-send

    # Check every minute instead of the configured interval
    pk-send --interval 60

    # Process due jobs once and exit
    pk-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the job being posted)

CONFIGURATION:
    Configuration file: ~/.config/postkeeper/config.toml
    Override with POSTKEEPER_CONFIG, workspace with POSTKEEPER_HOME

    [scheduler]
    poll_interval = 300  # seconds between checks

    [[destinations]]
    name = \"facebook\"
    command = \"~/bin/post-facebook\"

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
    2 - Workspace error
")]
struct Cli {
    /// Seconds between checks (overrides config)
    #[arg(short, long, value_name = "SECONDS")]
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due jobs once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        LoggingConfig::from_env(true).init();
    } else {
        logging::init_default();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<PostkeeperError>()
            .map(PostkeeperError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let manager = JobManager::open(&config).await?;
    let registry = DestinationRegistry::from_config(&config.destinations)?;

    info!("pk-send daemon starting");
    if registry.is_empty() {
        info!("No destinations configured; due jobs will be marked failed");
    } else {
        info!("Destinations: {}", registry.names().join(", "));
    }

    let scheduler = Scheduler::new(manager, registry);

    if cli.once {
        let report = scheduler.run_once().await?;
        info!(
            "Processed {} job(s): {} posted, {} failed, {} skipped",
            report.processed(),
            report.posted.len(),
            report.failed.len(),
            report.skipped.len()
        );
        info!("pk-send: processed due jobs once, exiting");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone())?;

    let interval = cli.interval.unwrap_or(config.scheduler.poll_interval);
    scheduler
        .run_forever(Duration::from_secs(interval), shutdown)
        .await?;

    info!("pk-send daemon stopped");
    Ok(())
}

/// Cancel `shutdown` on the first SIGINT or SIGTERM
#[cfg(unix)]
fn setup_signal_handlers(shutdown: CancellationToken) -> anyhow::Result<()> {
    use anyhow::Context;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Received shutdown signal, stopping gracefully...");
            shutdown.cancel();
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: CancellationToken) -> anyhow::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.cancel();
        }
    });
    Ok(())
}
