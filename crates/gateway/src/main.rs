//! Faucet gateway binary

use clap::Parser;
use faucet_gateway::config::ChainMode;
use faucet_gateway::logging::{self, LogFormat};
use faucet_gateway::metrics::GatewayMetrics;
use faucet_gateway::{api, GatewayConfig, GatewayService, NetworkTable};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Faucet gateway CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path (TOML, YAML or JSON)
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Server address
    #[arg(long)]
    server_addr: Option<String>,

    /// Chain client backing every network
    #[arg(long, value_enum)]
    mode: Option<ChainMode>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GatewayConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(addr) = args.server_addr {
        config.server_addr = addr;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    logging::init(&config.logging, args.debug)?;
    info!("Starting Faucet Gateway v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  Chain mode: {:?}", config.mode);
    info!("  Seed fraction: {} bps", config.seed_fraction_bps);
    info!("  Receipt timeout: {}s", config.receipt_timeout_secs);

    let networks = NetworkTable::from_config(&config)?;
    for network in networks.iter() {
        if network.client().connected().await {
            info!("Network {} reachable", network.name());
        } else {
            warn!("Network {} is not reachable, requests to it will fail", network.name());
        }
    }

    let metrics = Arc::new(GatewayMetrics::new()?);
    let service = Arc::new(GatewayService::new(&config, networks, metrics)?);
    info!("Gateway service initialized");

    let app = api::router(service, config.cors_enabled);

    let addr: SocketAddr = config.server_addr.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
