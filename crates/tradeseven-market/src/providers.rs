//! HTTP price feeds: Finnhub for stocks, CoinGecko for crypto.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use tradeseven_core::AssetClass;

use crate::catalog;
use crate::error::{MarketError, MarketResult};
use crate::source::{PriceSource, Quote};

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(8).normalize())
}

// ============================================================================
// Finnhub (stocks)
// ============================================================================

/// Configuration for the Finnhub quote API
#[derive(Debug, Clone)]
pub struct FinnhubConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Finnhub stock quote client
pub struct FinnhubClient {
    config: FinnhubConfig,
    client: reqwest::Client,
}

impl FinnhubClient {
    pub fn new(config: FinnhubConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct FinnhubQuote {
    /// current price
    c: Option<f64>,
    /// change
    d: Option<f64>,
    /// percent change
    dp: Option<f64>,
}

#[async_trait]
impl PriceSource for FinnhubClient {
    fn name(&self) -> &'static str {
        "Finnhub"
    }

    async fn get_price(&self, symbol: &str, _class: AssetClass) -> MarketResult<Quote> {
        let url = format!("{}/api/v1/quote", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("token", self.config.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let data: FinnhubQuote = response.json().await?;

        // Finnhub answers unknown symbols with all-zero quotes
        let price = data
            .c
            .and_then(to_decimal)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| MarketError::NoPrice {
                symbol: symbol.to_string(),
            })?;

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            change: data.d.and_then(to_decimal).unwrap_or_default(),
            percent_change: data.dp.and_then(to_decimal).unwrap_or_default(),
        })
    }
}

// ============================================================================
// CoinGecko (crypto)
// ============================================================================

/// Configuration for the CoinGecko simple price API
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
}

/// CoinGecko crypto price client. Symbols are mapped to CoinGecko ids
/// through the catalog.
pub struct CoinGeckoClient {
    config: CoinGeckoConfig,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    pub fn new(config: CoinGeckoConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct CoinGeckoPrice {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "CoinGecko"
    }

    async fn get_price(&self, symbol: &str, _class: AssetClass) -> MarketResult<Quote> {
        let id = catalog::lookup(symbol)
            .and_then(|e| e.coingecko_id)
            .ok_or_else(|| MarketError::UnknownAsset {
                symbol: symbol.to_string(),
            })?;

        let url = format!("{}/api/v3/simple/price", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", id),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let mut data: HashMap<String, CoinGeckoPrice> = response.json().await?;
        let entry = data.remove(id).ok_or_else(|| MarketError::InvalidResponse {
            message: format!("no data for {}", id),
        })?;

        let price = entry
            .usd
            .and_then(to_decimal)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| MarketError::NoPrice {
                symbol: symbol.to_string(),
            })?;
        let percent_change = entry.usd_24h_change.and_then(to_decimal).unwrap_or_default();
        // absolute change derived from the 24h percentage
        let change = (price * percent_change)
            .checked_div(Decimal::ONE_HUNDRED + percent_change)
            .unwrap_or_default()
            .round_dp(8);

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            change,
            percent_change,
        })
    }
}

// ============================================================================
// Router
// ============================================================================

/// Dispatches lookups to the stock or crypto feed by asset class.
pub struct MarketRouter {
    stocks: Arc<dyn PriceSource>,
    crypto: Arc<dyn PriceSource>,
}

impl MarketRouter {
    pub fn new(stocks: Arc<dyn PriceSource>, crypto: Arc<dyn PriceSource>) -> Self {
        Self { stocks, crypto }
    }
}

#[async_trait]
impl PriceSource for MarketRouter {
    fn name(&self) -> &'static str {
        "Router"
    }

    async fn get_price(&self, symbol: &str, class: AssetClass) -> MarketResult<Quote> {
        match class {
            AssetClass::Stock => self.stocks.get_price(symbol, class).await,
            AssetClass::Crypto => self.crypto.get_price(symbol, class).await,
        }
    }
}
