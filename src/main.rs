//! Peerwatch - DNS-based cluster membership discovery daemon.

use anyhow::Result;
use clap::Parser;
use peerwatch::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            // Logging is not initialized yet, so report on stderr directly.
            eprintln!("Failed to load configuration: {err:#}");
            std::process::exit(1);
        }
    };

    // Initialize logging. RUST_LOG wins over the configured level.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Peerwatch starting up...");

    // Log the loaded configuration settings for visibility
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Node Address: {}:{}", config.node.host, config.node.port);
    if config.metrics.enabled {
        info!("Metrics Endpoint: {}", config.metrics.listen_address);
    } else {
        info!("Metrics Endpoint: Disabled");
    }
    info!("-------------------------------------------------------");

    // =========================================================================
    // Create Shutdown Channel
    // =========================================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        if shutdown_tx.send(true).is_err() {
            error!("Shutdown channel closed before the signal could be sent.");
        }
    });

    let app = App::builder(config).build(shutdown_rx).await?;
    if let Some(addr) = app.metrics_addr() {
        info!("Prometheus metrics available at http://{}/metrics", addr);
    }
    app.run().await?;

    info!("Peerwatch exited cleanly.");
    Ok(())
}
