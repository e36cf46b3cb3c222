//! Relay proxy front server.
//!
//! ```text
//!   browser ──▶ front (axum) ──▶ Relay::launch ──┬──▶ direct origin / CDN
//!                                                └──▶ relay host (level 1..n)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use relay_proxy::config::{load_config, RelayConfig};
use relay_proxy::observability::{logging, metrics};
use relay_proxy::{FrontServer, Relay};

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Local front server for the header-encoded relay proxy", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relay.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config: RelayConfig = load_config(&cli.config)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-proxy starting");

    tracing::info!(
        bind_address = %config.front.bind_address,
        public_origin = %config.front.public_origin,
        relay_nodes = config.relay.nodes.len(),
        max_retry = config.protocol.max_retry,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let relay = Arc::new(Relay::from_config(&config)?);

    let listener = TcpListener::bind(&config.front.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    FrontServer::new(&config.front, relay.clone()).run(listener).await?;
    relay.flush_affinity().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
