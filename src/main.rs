//! tombstone service
//!
//! Runs the dropped-table reclaimer against the local filesystem: recovers
//! tables left in `metadata_dropped` by a previous run, then deletes each one
//! once its grace period has passed.
//!
//! With `--list` it prints the `marked_dropped_tables` view after recovery
//! and exits without deleting anything. Dropping and undropping tables is
//! left to the embedding server, through the `dropped-tables` library.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::{Configuration, SystemClock};
use datafusion::prelude::SessionContext;
use dropped_tables::{
    DroppedTablesRegistry, FsDeleter, MarkedDroppedTablesProvider, Reclaimer, ReclaimerConfig,
    scan_metadata_dropped,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = common::config::DEFAULT_CONFIG_FILE)]
    config: String,

    /// Print the recovered dropped tables and exit
    #[arg(long)]
    list: bool,
}

/// Print `marked_dropped_tables` for the recovered registry.
async fn list_dropped_tables(registry: Arc<DroppedTablesRegistry>) -> Result<()> {
    let ctx = SessionContext::new();
    MarkedDroppedTablesProvider::new(registry)
        .register(&ctx)
        .context("Failed to register marked_dropped_tables")?;

    ctx.sql(
        "SELECT database, \"table\", uuid, engine, metadata_dropped_path, \
         table_dropped_time, reclaim_after FROM marked_dropped_tables ORDER BY reclaim_after",
    )
    .await
    .context("Failed to plan marked_dropped_tables query")?
    .show()
    .await
    .context("Failed to read marked_dropped_tables")?;

    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let config = Configuration::load_from_path(Path::new(&args.config))
        .context("Failed to load configuration")?;
    let dropped_tables = &config.dropped_tables;
    dropped_tables
        .validate()
        .context("Invalid dropped_tables configuration")?;

    tracing::info!(
        grace_period = ?dropped_tables.grace_period,
        tick_interval = ?dropped_tables.reclaim_tick_interval,
        metadata_dropped_dir = %dropped_tables.metadata_dropped_dir.display(),
        "Starting tombstone reclaimer"
    );

    let registry = Arc::new(DroppedTablesRegistry::new());
    scan_metadata_dropped(
        &dropped_tables.metadata_dropped_dir,
        &registry,
        dropped_tables.grace_period,
    )
    .await
    .context("Failed to recover dropped tables")?;

    if args.list {
        return list_dropped_tables(registry).await;
    }

    if dropped_tables.data_root.is_none() {
        tracing::warn!("No data_root configured, only metadata files will be deleted");
    }

    let reclaimer = Arc::new(Reclaimer::new(
        registry.clone(),
        Arc::new(FsDeleter::new(dropped_tables.data_root.clone())),
        Arc::new(SystemClock),
        ReclaimerConfig::from(dropped_tables),
    ));
    let handle = reclaimer.clone().spawn();

    tracing::info!(tracked = registry.len(), "Reclaimer running, waiting for shutdown signal");
    wait_for_shutdown_signal().await?;

    tracing::info!("Shutting down, waiting for in-flight deletes");
    handle.shutdown().await?;

    reclaimer.metrics().summary().log();
    tracing::info!(remaining = registry.len(), "tombstone stopped");

    Ok(())
}
