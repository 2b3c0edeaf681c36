//! # TradeSeven Market Data
//!
//! Best-effort price feeds for battles and the asset picker.
//!
//! - **Finnhub** quotes stocks (needs an API key)
//! - **CoinGecko** quotes crypto (no key)
//! - [`MarketRouter`] sends each lookup to the right feed by asset class
//! - [`fetch_prices`] runs lookups in small timed batches and never fails:
//!   a symbol whose lookup errors or times out keeps its fallback price
//!
//! ## Usage
//!
//! ```ignore
//! use tradeseven_market::{
//!     fetch_prices, BatchConfig, CoinGeckoClient, CoinGeckoConfig, FinnhubClient, FinnhubConfig,
//!     MarketRouter,
//! };
//!
//! let stocks = Arc::new(FinnhubClient::new(FinnhubConfig { base_url, api_key }));
//! let crypto = Arc::new(CoinGeckoClient::new(CoinGeckoConfig { base_url: gecko_url }));
//! let router = MarketRouter::new(stocks, crypto);
//! let prices = fetch_prices(&router, battle.unique_assets(), &BatchConfig::default()).await;
//! ```

pub mod batch;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod providers;
pub mod source;

pub use batch::{fetch_prices, fetch_quotes, BatchConfig, FetchedQuote, PriceRequest};
pub use cache::{MarketAsset, QuoteCache};
pub use catalog::CatalogEntry;
pub use error::{MarketError, MarketResult};
pub use providers::{CoinGeckoClient, CoinGeckoConfig, FinnhubClient, FinnhubConfig, MarketRouter};
pub use source::{PriceSource, Quote, StaticPriceSource};
