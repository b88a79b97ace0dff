//! Port Statistics Exporter
//!
//! Main entry point for the portstatsd daemon.
//! Serves Prometheus metrics scraped on demand from the switch web UI.

use anyhow::Context;
use clap::Parser;
use portstatsd::{
    DEFAULT_CONFIG_PATH, DeviceClient, MetricsServer, PortStatsCollector, PortstatsConfig,
    PortstatsError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Prometheus exporter for switches managed through a web UI
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Metrics listen address, overrides `listen_address` from the config file
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging()?;

    info!("portstatsd: Starting port statistics exporter");

    match run_daemon(args).await {
        Ok(()) => {
            info!("portstatsd: Exporter exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "portstatsd: Exporter exiting with error");
            Err(e)
        }
    }
}

/// Initialize structured logging, honouring RUST_LOG
fn init_logging() -> Result<(), PortstatsError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| PortstatsError::Configuration(format!("Failed to set logger: {}", e)))
}

/// Load configuration, then serve metrics until a shutdown signal arrives
async fn run_daemon(args: Args) -> anyhow::Result<()> {
    let mut config = PortstatsConfig::load(&args.config)
        .with_context(|| format!("reading configuration from {}", args.config.display()))?;
    if let Some(listen) = args.listen {
        config.listen_address = listen;
    }
    config.validate().context("validating configuration")?;

    info!(
        config = %args.config.display(),
        device = %config.address,
        timeout_secs = config.timeout_seconds,
        poll_interval_secs = config.poll_interval().as_secs(),
        "portstatsd: Configuration loaded"
    );

    let device = DeviceClient::from_config(&config).context("creating device client")?;
    let collector = Arc::new(PortStatsCollector::new(Box::new(device))?);

    let server = MetricsServer::bind(config.listen_addr()?, collector).await?;
    server.run(shutdown_signal()).await?;

    info!("portstatsd: Graceful shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "portstatsd: Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "portstatsd: Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("portstatsd: Received SIGINT"),
        _ = terminate => info!("portstatsd: Received SIGTERM"),
    }
}
