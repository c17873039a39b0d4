//! Edge Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────────────┐
//!                      │                      EDGE GATEWAY                       │
//!                      │                                                         │
//!   Client Request     │  ┌──────────┐   ┌───────────┐   ┌──────────────────┐    │
//!   ───────────────────┼─▶│  http    │──▶│ admission │──▶│ signature verify │    │
//!                      │  │  server  │   │ allow-list│   │ (HMAC + nonce)   │    │
//!                      │  └──────────┘   └─────┬─────┘   └────────┬─────────┘    │
//!                      │                       │ 403              │ 403          │
//!                      │                       ▼                  ▼              │
//!                      │                                  ┌──────────────────┐   │
//!                      │                                  │    forwarder     │───┼──▶ Upstream
//!                      │                                  └────────┬─────────┘   │
//!   Client Response    │  ┌──────────────────────┐                 │             │
//!   ◀──────────────────┼──│ response interceptor │◀────────────────┘             │
//!                      │  │ (stream, count, log) │                               │
//!                      │  └──────────────────────┘                               │
//!                      └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::health::UpstreamProbe;
use edge_gateway::observability::{logging, metrics};
use edge_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "API gateway edge filter", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        allow_list = ?config.admission.allow_list,
        allowed_skew_secs = config.auth.allowed_skew_secs,
        credentials = config.credentials.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let probe = UpstreamProbe::new(&config.upstream, config.probe.clone());
    let probe_task = tokio::spawn(probe.run(shutdown.subscribe()));

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    let _ = probe_task.await;
    tracing::info!("Shutdown complete");
    Ok(())
}
