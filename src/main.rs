//! mssqlmon Binary Entry Point
//!
//! Runs the configured SQL Server plugins on their schedules and prints every
//! metric to stdout. Core functionality is provided by the `mssqlmon` library.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mssqlmon::{
    accumulator::{Accumulator, WriterAccumulator},
    collector::{
        Collector, CollectorRegistry, plugins::build_plugins, run_collection, sqlserver::TdsDriver,
    },
    config::{AppConfig, parse_duration},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// mssqlmon - SQL Server metric collection agent
#[derive(Parser, Debug)]
#[command(name = "mssqlmon", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/mssqlmon.yaml",
        env = "MSSQLMON_CONFIG"
    )]
    config: String,

    /// Gather interval for plugins without their own schedule (overrides config file)
    #[arg(long, env = "MSSQLMON_INTERVAL", value_parser = parse_duration)]
    interval: Option<Duration>,

    /// Run one gather cycle of every plugin and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries metrics.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mssqlmon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load_with_plugin_dir(&cli.config)?;
    if let Some(interval) = cli.interval {
        config = config.with_interval(interval);
    }

    let schedule = config.agent.schedule()?;
    tracing::info!(
        schedule = %schedule,
        connect_timeout = ?config.agent.connect_timeout,
        output = %config.agent.output,
        plugins = config.plugins.len(),
        "Configuration loaded"
    );

    let driver = Arc::new(TdsDriver::new(config.agent.connect_timeout));
    let acc: Arc<dyn Accumulator> = Arc::new(WriterAccumulator::stdout(config.agent.output));
    let plugins = build_plugins(&config.plugins, &schedule, driver)?;
    if plugins.is_empty() {
        tracing::warn!("No enabled plugins configured");
    }

    if cli.once {
        for plugin in &plugins {
            run_collection(plugin.as_ref(), Arc::clone(&acc)).await;
        }
        tracing::info!("Single gather cycle complete");
        return Ok(());
    }

    let registry = CollectorRegistry::new(Arc::clone(&acc)).await?;
    for plugin in plugins {
        let name = plugin.name().to_string();
        if let Err(e) = registry.spawn(plugin).await {
            tracing::error!("Failed to spawn plugin '{}': {}", name, e);
        }
    }
    registry.start().await?;

    tracing::info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;

    tracing::info!("Shutting down collectors...");
    if let Err(e) = registry.shutdown().await {
        tracing::error!("Failed to shutdown collectors: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
