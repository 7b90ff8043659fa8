//! tally-proxy
//!
//! A forwarding proxy that tallies response bytes per path.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌─────────────────────────────────────────────────┐
//!                        │                  TALLY PROXY                    │
//!                        │                                                 │
//!     Client Request     │  ┌─────────┐    ┌──────────┐    ┌───────────┐   │
//!     ───────────────────┼─▶│   net   │───▶│  http    │───▶│  backend  │───┼───▶ Backend
//!                        │  │listener │    │ handler  │    │   pool    │   │     Server
//!                        │  └─────────┘    └────┬─────┘    └───────────┘   │
//!                        │                      │                          │
//!     Client Response    │                      ▼                          │
//!     ◀──────────────────┼──────────────  ┌──────────┐                     │
//!       (+ X-Bytes)      │                │  stats   │                     │
//!                        │                │  ledger  │                     │
//!                        │                └──────────┘                     │
//!                        │                                                 │
//!                        │  config · observability · lifecycle             │
//!                        └─────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tally_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use tally_proxy::lifecycle::{stop_on_ctrl_c, Shutdown};
use tally_proxy::net::Listener;
use tally_proxy::observability::{logging, metrics};
use tally_proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "tally-proxy")]
#[command(about = "HTTP forwarding proxy that reports bytes served per path", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(long)]
    listen: Option<String>,

    /// Override backend.address.
    #[arg(long)]
    backend: Option<String>,

    /// Override pool.capacity.
    #[arg(long)]
    pool_capacity: Option<usize>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ProxyConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if let Some(backend) = &self.backend {
            config.backend.address = backend.clone();
        }
        if let Some(capacity) = self.pool_capacity {
            config.pool.capacity = capacity;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("tally-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        // Validated above.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let server = ProxyServer::new(&config)?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    stop_on_ctrl_c(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
