//! Chain gateway entry point.

use std::path::Path;
use tokio::net::TcpListener;

use chain_gateway::config::loader::load_config;
use chain_gateway::config::GatewayConfig;
use chain_gateway::http::GatewayServer;
use chain_gateway::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("chain_gateway=debug,tower_http=info");

    tracing::info!("chain-gateway v0.1.0 starting");

    // Optional config file path as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => {
            tracing::warn!("no config file given, using defaults (no chains registered)");
            GatewayConfig::default()
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        chains = config.chains.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    let server = GatewayServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
