//! The price source abstraction.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeseven_core::AssetClass;

use crate::error::{MarketError, MarketResult};

/// A single price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    /// Absolute change over the feed's reference period (a day for stocks,
    /// 24h rolling for crypto).
    pub change: Decimal,
    pub percent_change: Decimal,
}

impl Quote {
    pub fn flat(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: Decimal::ZERO,
            percent_change: Decimal::ZERO,
        }
    }
}

/// Trait for price feeds
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Fetch the current quote for `symbol`.
    async fn get_price(&self, symbol: &str, class: AssetClass) -> MarketResult<Quote>;
}

/// In-memory price source with fixed prices and scripted failures.
///
/// Used for offline runs and tests. Symbols without a price return
/// [`MarketError::NoPrice`]; an optional delay simulates a slow feed.
#[derive(Default)]
pub struct StaticPriceSource {
    prices: RwLock<HashMap<String, Decimal>>,
    delay: Option<Duration>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let source = Self::new();
        for (symbol, price) in prices {
            source.set_price(symbol, price);
        }
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, symbol: impl Into<String>, price: Decimal) {
        self.prices.write().insert(symbol.into(), price);
    }

    pub fn remove_price(&self, symbol: &str) {
        self.prices.write().remove(symbol);
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn name(&self) -> &'static str {
        "Static"
    }

    async fn get_price(&self, symbol: &str, _class: AssetClass) -> MarketResult<Quote> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.prices
            .read()
            .get(symbol)
            .map(|p| Quote::flat(symbol, *p))
            .ok_or_else(|| MarketError::NoPrice {
                symbol: symbol.to_string(),
            })
    }
}
