//! Server Configuration
//!
//! Layered from an optional file, `config/default`, `config/local` and
//! `TRADESEVEN__*` environment variables, then overridden by CLI flags.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use tradeseven_api::ApiConfig;
use tradeseven_engine::{EngineConfig, PollerConfig};
use tradeseven_market::BatchConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub market: MarketConfig,

    #[serde(default)]
    pub battle: BattleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_true")]
    pub enable_tracing: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: default_cors_origins(),
            enable_tracing: true,
        }
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(s: &ApiSettings) -> Self {
        ApiConfig {
            enable_cors: s.enable_cors,
            cors_origins: s.cors_origins.clone(),
            enable_tracing: s.enable_tracing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding battles.json, profiles.json and history.json
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Price feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Falls back to `FINNHUB_API_KEY`; without either, stock quotes use
    /// catalog prices.
    #[serde(default)]
    pub finnhub_api_key: Option<String>,

    #[serde(default = "default_finnhub_url")]
    pub finnhub_base_url: String,

    #[serde(default = "default_coingecko_url")]
    pub coingecko_base_url: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            finnhub_api_key: None,
            finnhub_base_url: default_finnhub_url(),
            coingecko_base_url: default_coingecko_url(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            lookup_timeout_secs: default_lookup_timeout(),
        }
    }
}

impl MarketConfig {
    pub fn batch(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size.max(1),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            lookup_timeout: Duration::from_secs(self.lookup_timeout_secs),
        }
    }
}

/// Battle timing and background loop intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    #[serde(default = "default_duration_hours")]
    pub duration_hours: i64,

    /// Unjoined challenges older than this are pruned
    #[serde(default = "default_duration_hours")]
    pub waiting_ttl_hours: i64,

    #[serde(default = "default_settlement_interval")]
    pub settlement_interval_secs: u64,

    #[serde(default = "default_price_refresh_interval")]
    pub price_refresh_interval_secs: u64,

    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            duration_hours: default_duration_hours(),
            waiting_ttl_hours: default_duration_hours(),
            settlement_interval_secs: default_settlement_interval(),
            price_refresh_interval_secs: default_price_refresh_interval(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

impl BattleConfig {
    pub fn pollers(&self) -> PollerConfig {
        PollerConfig {
            settlement_interval: Duration::from_secs(self.settlement_interval_secs.max(1)),
            price_refresh_interval: Duration::from_secs(self.price_refresh_interval_secs.max(1)),
            prune_interval: Duration::from_secs(self.prune_interval_secs.max(1)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_finnhub_url() -> String {
    "https://finnhub.io".to_string()
}

fn default_coingecko_url() -> String {
    "https://api.coingecko.com".to_string()
}

fn default_batch_size() -> usize {
    6
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_lookup_timeout() -> u64 {
    5
}

fn default_duration_hours() -> i64 {
    24
}

fn default_settlement_interval() -> u64 {
    10
}

fn default_price_refresh_interval() -> u64 {
    300 // 5 minutes
}

fn default_prune_interval() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("TRADESEVEN")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build().context("failed to read configuration")?;
        let mut server_config: ServerConfig = config
            .try_deserialize()
            .context("invalid configuration")?;

        if server_config.market.finnhub_api_key.is_none() {
            server_config.market.finnhub_api_key =
                std::env::var("FINNHUB_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(server_config)
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            battle_duration: chrono::Duration::hours(self.battle.duration_hours.max(1)),
            waiting_ttl: chrono::Duration::hours(self.battle.waiting_ttl_hours.max(1)),
            batch: self.market.batch(),
        }
    }
}
