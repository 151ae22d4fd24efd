//! Edge gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────────┐
//!                      │                       EDGE GATEWAY                        │
//!                      │                                                            │
//!   Client Request     │  ┌──────────┐   ┌────────────────────────────────────┐    │
//!   ───────────────────┼─▶│  server  │──▶│ pipeline: recovery → request log → │    │
//!                      │  │ + req id │   │ metrics → rate limit → auth →      │    │
//!                      │  └──────────┘   │ tracing                            │    │
//!                      │                 └─────────────────┬──────────────────┘    │
//!                      │                                   ▼                       │
//!                      │  ┌──────────┐   ┌──────────────┐  ┌──────────────┐        │
//!   Client Response    │  │  proxy   │◀──│ route table  │◀─│   resolver   │◀─ discovery
//!   ◀──────────────────┼──│ handler  │   │ (generation) │  │ (build time) │        │
//!                      │  └────┬─────┘   └──────▲───────┘  └──────────────┘        │
//!                      │       │                │                                   │
//!                      │       ▼         ┌──────┴───────┐                           │
//!                      │    backend      │ reload coord │◀── file watcher / SIGHUP  │
//!                      │                 └──────────────┘                           │
//!                      └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::load_config;
use edge_gateway::discovery::{ConsulDiscovery, ServiceDiscovery};
use edge_gateway::lifecycle::{spawn_signal_handler, GatewayBuilder, Shutdown};
use edge_gateway::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Edge HTTP gateway with hot-reloadable routing", long_about = None)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, default_value = "config/gateway.toml")]
    config: PathBuf,

    /// Override the listening port from the config file.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Without a readable initial config there is no good state to run on.
    let mut config = load_config(&cli.config)
        .map_err(|e| format!("failed to load {}: {e}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let log_level = init_logging(&config.log_level)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gateway starting");

    metrics::init_metrics();

    tracing::info!(
        port = config.port,
        routes = config.routes.len(),
        rate_limit = config.rate_limit.enabled,
        auth = config.auth.enabled,
        discovery = config.service_discovery.enabled,
        tracing = config.tracing.enabled,
        "Configuration loaded"
    );

    let mut builder = GatewayBuilder::new(cli.config.clone(), config.clone()).log_level(log_level);
    if cli.port.is_some() {
        builder = builder.port_override();
    }
    match ConsulDiscovery::from_config(&config.service_discovery) {
        Ok(Some(consul)) => {
            tracing::info!(
                address = %config.service_discovery.consul.address,
                enabled = config.service_discovery.enabled,
                "Consul discovery configured"
            );
            builder = builder.discovery(Arc::new(consul) as Arc<dyn ServiceDiscovery>);
        }
        Ok(None) => {}
        Err(err) => tracing::error!(error = %err, "Service discovery unavailable"),
    }
    let gateway = builder.build().await;

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let _signals = spawn_signal_handler(Arc::clone(&shutdown), Arc::clone(&gateway.coordinator))?;

    gateway.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
