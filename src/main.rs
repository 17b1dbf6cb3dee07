//! Download gateway
//!
//! Verifies signed download paths, resolves them through the file-listing
//! service and either redirects the caller or streams the file itself.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                 DOWNLOAD GATEWAY                  │
//!                        │                                                   │
//!   GET /path?sign=..    │  ┌────────┐   ┌───────────┐   ┌──────────────┐   │
//!   ─────────────────────┼─▶│  http  │──▶│ security  │──▶│   upstream   │◀──┼──▶ listing service
//!                        │  │ server │   │ signature │   │  link.rs     │   │    /api/fs/link
//!                        │  └────────┘   └───────────┘   └──────┬───────┘   │
//!                        │                                      ▼           │
//!                        │               ┌─────┐        ┌──────────────┐   │
//!                        │               │ geo │───────▶│   routing    │   │
//!                        │               └─────┘        │   policy     │   │
//!                        │                              └──┬────────┬──┘   │
//!   302 Location         │                      Direct     │        │ Proxy│
//!   ◀────────────────────┼─────────────────────────────────┘        ▼      │
//!   streamed body        │                              ┌──────────────┐   │
//!   ◀────────────────────┼──────────────────────────────│  forward.rs  │◀──┼──── file host
//!                        │                              └──────────────┘   │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::Path;

use clap::Parser;
use tokio::net::TcpListener;

use download_gateway::config::CliArgs;
use download_gateway::geo::GeoClassifier;
use download_gateway::http::HttpServer;
use download_gateway::lifecycle::{signals, Shutdown};
use download_gateway::net::load_tls_config;
use download_gateway::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliArgs::parse().into_config()?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "download-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        tls = config.listener.tls.is_some(),
        sign_disabled = config.security.disable_sign,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let geo = GeoClassifier::open(
        Path::new(&config.geo.database_path),
        config.geo.domestic_country.as_str(),
    );
    let server = HttpServer::new(&config, geo)?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    match &config.listener.tls {
        Some(tls) => {
            let rustls = load_tls_config(tls).await?;
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            server.run_tls(addr, rustls, shutdown_rx).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, shutdown_rx).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
