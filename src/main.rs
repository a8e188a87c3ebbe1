//! Edge gateway binary.
//!
//! ```text
//!     Client ──▶ Correlation ─▶ AccessLog ─▶ Cors ─▶ RateLimit ─▶ RouteDispatcher
//!                                                                  │
//!                                  public ◀───────────────────────┤
//!                                  protected ─▶ Authenticator ────┤
//!                                                                  ▼
//!     Client ◀──────────────────────────────────────────────── Forwarder ◀──▶ users / orders
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::load_config;
use edge_gateway::lifecycle::{wait_for_shutdown_signal, Shutdown};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "edge-gateway", version)]
#[command(about = "Single-entry HTTP gateway for the users and orders services", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults are used when absent.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.observability)?;

    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.len(),
        routes = config.routes.len(),
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let mut serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut serving => result??,
        _ = wait_for_shutdown_signal() => {
            shutdown.trigger();
            serving.await??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
