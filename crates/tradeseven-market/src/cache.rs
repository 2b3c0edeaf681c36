//! Last-known quotes for the catalog, refreshed in the background.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;

use tradeseven_core::AssetClass;

use crate::batch::{fetch_quotes, BatchConfig, PriceRequest};
use crate::catalog::{self, CatalogEntry};
use crate::source::{PriceSource, Quote};

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: Quote,
    live: bool,
    fetched_at: DateTime<Utc>,
}

/// A catalog asset with its most recent quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAsset {
    pub symbol: &'static str,
    pub name: &'static str,
    pub asset_class: AssetClass,
    pub price: Decimal,
    pub change: Decimal,
    pub percent_change: Decimal,
    /// `false` when the price is a fallback constant.
    pub live: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl MarketAsset {
    fn new(entry: &CatalogEntry, quote: &Quote, live: bool, fetched_at: Option<DateTime<Utc>>) -> Self {
        Self {
            symbol: entry.symbol,
            name: entry.name,
            asset_class: entry.asset_class,
            price: quote.price,
            change: quote.change,
            percent_change: quote.percent_change,
            live,
            fetched_at,
        }
    }
}

/// Concurrent symbol → quote cache.
#[derive(Debug, Default)]
pub struct QuoteCache {
    quotes: DashMap<String, CachedQuote>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.quotes.get(symbol).map(|c| c.quote.clone())
    }

    pub fn insert(&self, quote: Quote, live: bool, now: DateTime<Utc>) {
        self.quotes.insert(
            quote.symbol.clone(),
            CachedQuote {
                quote,
                live,
                fetched_at: now,
            },
        );
    }

    /// Refetch every catalog entry of `class`. Returns how many came back live.
    pub async fn refresh(
        &self,
        source: &dyn PriceSource,
        class: AssetClass,
        config: &BatchConfig,
        now: DateTime<Utc>,
    ) -> usize {
        let requests: Vec<PriceRequest> = catalog::entries(class).iter().map(PriceRequest::from).collect();
        let fetched = fetch_quotes(source, &requests, config).await;
        let live = fetched.iter().filter(|f| f.live).count();

        for f in fetched {
            // never replace a live quote with a fallback constant
            let keep_previous = !f.live && self.quotes.get(&f.quote.symbol).is_some_and(|c| c.live);
            if !keep_previous {
                self.insert(f.quote, f.live, now);
            }
        }

        tracing::info!(class = %class, live, total = requests.len(), "market quotes refreshed");
        live
    }

    /// Catalog listing for `class`, filled from the cache. Entries never
    /// fetched show their fallback price.
    pub fn market(&self, class: AssetClass) -> Vec<MarketAsset> {
        catalog::entries(class)
            .iter()
            .map(|entry| match self.quotes.get(entry.symbol) {
                Some(cached) => MarketAsset::new(entry, &cached.quote, cached.live, Some(cached.fetched_at)),
                None => MarketAsset::new(entry, &Quote::flat(entry.symbol, entry.fallback_price), false, None),
            })
            .collect()
    }
}
