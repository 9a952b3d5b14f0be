//! # ipxbridged: IPX800 bridge daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (CLI args, env vars, config file)
//! - Turn `[[devices]]` tables into domain devices, skipping invalid ones
//! - Construct the IPX800 client (driven adapter) and start the bridge
//! - Build the axum router on top of the bridge
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT), then stop background tasks
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ipxbridge_adapter_http_axum::state::AppState;
use ipxbridge_adapter_ipx800::Ipx800Client;
use ipxbridge_app::bridge::Bridge;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config::config_path(std::env::args().nth(1));
    let config = Config::load(&path).with_context(|| format!("loading {path}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let (devices, rejected) = config.build_devices();
    for (name, err) in &rejected {
        tracing::error!(device = %name, error = %err, "invalid device configuration, skipped");
    }
    if devices.is_empty() {
        tracing::warn!(config = %path, "no device configured");
    }

    let client = Ipx800Client::new().context("building HTTP client")?;
    let bridge = Arc::new(Bridge::builder().devices(devices).start(client));

    let app = ipxbridge_adapter_http_axum::router::build(AppState::new(Arc::clone(&bridge)));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "ipxbridged listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    bridge.shutdown();
    tracing::info!("ipxbridged stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
