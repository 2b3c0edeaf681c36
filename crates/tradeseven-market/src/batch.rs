//! Bounded-concurrency price fetching with per-symbol fallbacks.
//!
//! Symbols are fetched in batches: every lookup in a batch runs
//! concurrently, each bounded by a timeout, and there is a short pause
//! between batches to stay under the feeds' rate limits. A lookup that
//! fails or times out never fails the batch; the request's fallback price
//! is used instead.

use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeseven_core::{AssetClass, PortfolioAsset, PriceMap};

use crate::catalog::CatalogEntry;
use crate::error::MarketError;
use crate::source::{PriceSource, Quote};

/// Batching knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub lookup_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 6,
            batch_delay: Duration::from_millis(500),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

/// One symbol to price, and what to use if the feed lets us down.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRequest {
    pub symbol: String,
    pub class: AssetClass,
    pub fallback: Decimal,
}

impl From<&PortfolioAsset> for PriceRequest {
    fn from(asset: &PortfolioAsset) -> Self {
        Self {
            symbol: asset.symbol.clone(),
            class: asset.asset_class,
            fallback: asset.price,
        }
    }
}

impl From<&CatalogEntry> for PriceRequest {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            symbol: entry.symbol.to_string(),
            class: entry.asset_class,
            fallback: entry.fallback_price,
        }
    }
}

/// A quote plus whether it came from the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedQuote {
    pub quote: Quote,
    pub live: bool,
}

async fn fetch_one(source: &dyn PriceSource, request: &PriceRequest, timeout: Duration) -> FetchedQuote {
    let lookup = tokio::time::timeout(timeout, source.get_price(&request.symbol, request.class));
    let outcome = match lookup.await {
        Ok(result) => result,
        Err(_) => Err(MarketError::Timeout {
            symbol: request.symbol.clone(),
        }),
    };

    match outcome {
        Ok(quote) if quote.price > Decimal::ZERO => FetchedQuote { quote, live: true },
        Ok(_) => {
            tracing::warn!(symbol = %request.symbol, fallback = %request.fallback, "non-positive price, using fallback");
            FetchedQuote {
                quote: Quote::flat(&request.symbol, request.fallback),
                live: false,
            }
        }
        Err(e) => {
            tracing::warn!(symbol = %request.symbol, fallback = %request.fallback, error = %e, "price lookup failed, using fallback");
            FetchedQuote {
                quote: Quote::flat(&request.symbol, request.fallback),
                live: false,
            }
        }
    }
}

/// Fetch quotes for every request, in request order.
pub async fn fetch_quotes(
    source: &dyn PriceSource,
    requests: &[PriceRequest],
    config: &BatchConfig,
) -> Vec<FetchedQuote> {
    let batch_size = config.batch_size.max(1);
    let batches = requests.chunks(batch_size).count();
    let mut out = Vec::with_capacity(requests.len());

    for (i, batch) in requests.chunks(batch_size).enumerate() {
        let results = join_all(
            batch
                .iter()
                .map(|r| fetch_one(source, r, config.lookup_timeout)),
        )
        .await;
        out.extend(results);

        if i + 1 < batches && !config.batch_delay.is_zero() {
            tokio::time::sleep(config.batch_delay).await;
        }
    }

    let live = out.iter().filter(|q| q.live).count();
    tracing::debug!(source = source.name(), requested = requests.len(), live, "fetched quotes");
    out
}

/// Fetch a symbol → price snapshot for `assets`.
///
/// Each asset's own `price` is its fallback. Duplicate symbols are fetched
/// once.
pub async fn fetch_prices<'a, I>(source: &dyn PriceSource, assets: I, config: &BatchConfig) -> PriceMap
where
    I: IntoIterator<Item = &'a PortfolioAsset>,
{
    let mut requests: Vec<PriceRequest> = Vec::new();
    for asset in assets {
        if !requests.iter().any(|r| r.symbol == asset.symbol) {
            requests.push(PriceRequest::from(asset));
        }
    }

    fetch_quotes(source, &requests, config)
        .await
        .into_iter()
        .map(|q| (q.quote.symbol, q.quote.price))
        .collect()
}
