//! LotPulse — analytics and telemetry service for the vehicle & trailer
//! marketplace.
//!
//! Main entry point that wires the tracking pipeline and starts the server.

use clap::Parser;
use lotpulse_api::{AnalyticsService, ApiServer};
use lotpulse_core::clock::system_clock;
use lotpulse_core::config::AppConfig;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "lotpulse")]
#[command(about = "Analytics and telemetry service for the vehicle & trailer marketplace")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "LOTPULSE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "LOTPULSE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "LOTPULSE__API__METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lotpulse=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("LotPulse starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.api.metrics_port = port;
    }

    config.validate().map_err(|e| {
        error!(error = %e, "Configuration rejected");
        anyhow::anyhow!("invalid configuration: {e}")
    })?;

    info!(
        node_id = %config.node_id,
        environment = %config.environment,
        http_port = config.api.http_port,
        metrics_port = config.api.metrics_port,
        "Configuration loaded"
    );

    // Wire the pipeline and start the background jobs
    let mut service = AnalyticsService::initialize(config.clone(), system_clock());
    let server = ApiServer::new(config.api.clone(), service.app_state());

    server.start_metrics().await?;

    tokio::select! {
        result = server.start_http() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    service.shutdown();
    info!("LotPulse stopped");
    Ok(())
}
