//! TradeSeven Server
//!
//! Serves the battle REST API and runs the background loops that settle
//! expired battles, refresh market quotes and prune stale challenges.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings
//! tradeseven-server
//!
//! # Start with custom config
//! tradeseven-server --config /path/to/config.toml
//!
//! # Start with environment overrides
//! TRADESEVEN__SERVER__PORT=8080 FINNHUB_API_KEY=... tradeseven-server
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tradeseven_api::{create_router, ApiConfig, AppState};
use tradeseven_engine::{spawn_pollers, BattleManager};
use tradeseven_market::{
    CoinGeckoClient, CoinGeckoConfig, FinnhubClient, FinnhubConfig, MarketRouter, PriceSource,
    StaticPriceSource,
};
use tradeseven_store::JsonFileStore;

use crate::config::ServerConfig;

// =============================================================================
// CLI Arguments
// =============================================================================

/// TradeSeven Server - portfolio battles over a REST API
#[derive(Parser, Debug)]
#[command(name = "tradeseven-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "TRADESEVEN_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "TRADESEVEN_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TRADESEVEN_PORT")]
    port: Option<u16>,

    /// Directory for battle, profile and history files
    #[arg(long, env = "TRADESEVEN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TRADESEVEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "TRADESEVEN_LOG_FORMAT")]
    log_format: Option<String>,

    /// Skip the background loops (settlement then only happens when a
    /// player views their profile)
    #[arg(long)]
    no_pollers: bool,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    apply_overrides(&mut server_config, &args);

    init_logging(&server_config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting TradeSeven server"
    );

    let store = Arc::new(JsonFileStore::open(&server_config.storage.data_dir).await?);
    tracing::info!(data_dir = %store.dir().display(), "storage ready");

    let prices = init_market(&server_config.market);

    let manager = Arc::new(BattleManager::new(
        store.clone(),
        store.clone(),
        store,
        prices,
        server_config.engine(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pollers = if args.no_pollers {
        Vec::new()
    } else {
        spawn_pollers(manager.clone(), server_config.battle.pollers(), shutdown_rx)
    };

    let state = Arc::new(AppState::new(manager));
    let app = create_router(state, ApiConfig::from(&server_config.api));

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        host = %server_config.server.host,
        port = server_config.server.port,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // a poller mid-tick finishes its pass before observing the flag
    let _ = shutdown_tx.send(true);
    let grace = server_config.server.shutdown_timeout();
    for handle in pollers {
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "poller task ended abnormally"),
            Err(_) => tracing::warn!(timeout_secs = grace.as_secs(), "poller did not stop in time"),
        }
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

fn apply_overrides(config: &mut ServerConfig, args: &Args) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
}

/// Initialize tracing/logging. `RUST_LOG` wins over the configured level.
fn init_logging(config: &config::LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
    }
}

/// Route stocks to Finnhub and crypto to CoinGecko.
fn init_market(config: &config::MarketConfig) -> Arc<dyn PriceSource> {
    let stocks: Arc<dyn PriceSource> = match &config.finnhub_api_key {
        Some(api_key) => Arc::new(FinnhubClient::new(FinnhubConfig {
            base_url: config.finnhub_base_url.clone(),
            api_key: api_key.clone(),
        })),
        None => {
            tracing::warn!("no Finnhub API key configured, stock prices will use fallbacks");
            Arc::new(StaticPriceSource::new())
        }
    };
    let crypto = Arc::new(CoinGeckoClient::new(CoinGeckoConfig {
        base_url: config.coingecko_base_url.clone(),
    }));

    Arc::new(MarketRouter::new(stocks, crypto))
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["tradeseven-server", "--port", "8080", "--no-pollers"]);
        assert_eq!(args.port, Some(8080));
        assert!(args.no_pollers);
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "tradeseven-server",
            "--host",
            "127.0.0.1",
            "--data-dir",
            "/tmp/t7",
            "--log-format",
            "json",
        ]);
        let mut config = ServerConfig::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/t7"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }
}
