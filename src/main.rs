//! Fan-out HTTP gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ route table ──▶ fan-out coordinator
//!                                                   │
//!                                  ┌────────────────┼────────────────┐
//!                                  ▼                ▼                ▼
//!                             dispatcher       dispatcher       dispatcher
//!                          (filters + call) (filters + call) (filters + call)
//!                                  │                │                │
//!                                  └────────▶ merge / passthrough ◀──┘
//!                                                   │
//!     Client ◀──────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use fanout_gateway::admin::{setup_admin_router, AdminState};
use fanout_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use fanout_gateway::http::HttpServer;
use fanout_gateway::lifecycle::{signals, Shutdown, StartupError};
use fanout_gateway::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "fanout-gateway", version, about = "Fan-out HTTP gateway")]
struct Args {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,

    /// Override `observability.log_level`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if args.check {
        println!(
            "configuration ok: {} routes, {} backends, filters {:?}",
            config.routes.len(),
            config.backends.len(),
            config.filters
        );
        return Ok(());
    }

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    logging::init_logging(&log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fanout-gateway starting");
    run(config, args.config).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn parse_addr(what: &'static str, addr: &str) -> Result<SocketAddr, StartupError> {
    addr.parse().map_err(|_| StartupError::Address {
        what,
        addr: addr.to_string(),
    })
}

async fn bind(what: &'static str, addr: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr).await.map_err(|source| StartupError::Bind {
        what,
        addr: addr.to_string(),
        source,
    })
}

async fn run(config: GatewayConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        backends = config.backends.len(),
        filters = ?config.filters,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = parse_addr("metrics", &config.observability.metrics_address)?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config.clone())?;
    let shutdown = Shutdown::new();

    if config.admin.enabled {
        let listener = bind("admin", &config.admin.bind_address).await?;
        let router = setup_admin_router(AdminState::new(
            server.routes(),
            server.filters(),
            &config.admin.api_key,
        ));
        let mut admin_shutdown = shutdown.subscribe();
        tracing::info!(address = %config.admin.bind_address, "Admin server listening");
        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    // Without a config file there is nothing to watch; the closed channel ends the reload loop.
    let (_watcher, config_updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = bind("listener", &config.listener.bind_address).await?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;
    Ok(())
}
