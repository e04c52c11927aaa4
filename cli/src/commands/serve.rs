// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Broker daemon: bind the agent channels, then serve the control plane.

use anyhow::{Context, Result};
use clap::Args;
use muster_core::domain::BrokerConfig;
use muster_core::infrastructure::tcp::{TcpFanin, TcpFanout};
use muster_core::presentation::{router, ServerState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Path to YAML configuration file (defaults apply when omitted)
    #[arg(short, long, env = "MUSTER_CONFIG_PATH", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the HTTP control-plane bind host
    #[arg(long, env = "MUSTER_HTTP_HOST")]
    pub http_host: Option<String>,

    /// Override the HTTP control-plane bind port
    #[arg(long, env = "MUSTER_HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Override the fan-out channel bind address
    #[arg(long, env = "MUSTER_FANOUT_BIND")]
    pub fanout_bind: Option<String>,

    /// Override the fan-in channel bind address
    #[arg(long, env = "MUSTER_FANIN_BIND")]
    pub fanin_bind: Option<String>,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = BrokerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(host) = args.http_host {
        config.http.host = host;
    }
    if let Some(port) = args.http_port {
        config.http.port = port;
    }
    if let Some(bind) = args.fanout_bind {
        config.channels.fanout_bind = bind;
    }
    if let Some(bind) = args.fanin_bind {
        config.channels.fanin_bind = bind;
    }
    config.validate().context("Configuration validation failed")?;

    let fanout = TcpFanout::bind(&config.channels.fanout_bind)
        .await
        .context("Failed to bind fan-out channel")?;
    let fanin = TcpFanin::bind(&config.channels.fanin_bind)
        .await
        .context("Failed to bind fan-in channel")?;
    info!(
        fanout = %fanout.local_addr(),
        fanin = %fanin.local_addr(),
        "agent channels bound"
    );

    let state = Arc::new(ServerState::new(
        Arc::new(fanout),
        Arc::new(fanin),
        config.windows.clone(),
    ));
    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Control plane listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Broker shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
