//! The fixed set of assets players can pick from.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use tradeseven_core::AssetClass;

/// Stock fallback when Finnhub has nothing.
pub const STOCK_FALLBACK_PRICE: Decimal = dec!(100);

/// One pickable asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub symbol: &'static str,
    pub name: &'static str,
    pub asset_class: AssetClass,
    /// CoinGecko id; `None` for stocks.
    #[serde(skip)]
    pub coingecko_id: Option<&'static str>,
    #[serde(skip)]
    pub fallback_price: Decimal,
}

const fn stock(symbol: &'static str, name: &'static str) -> CatalogEntry {
    CatalogEntry {
        symbol,
        name,
        asset_class: AssetClass::Stock,
        coingecko_id: None,
        fallback_price: STOCK_FALLBACK_PRICE,
    }
}

const fn coin(id: &'static str, symbol: &'static str, name: &'static str, fallback: Decimal) -> CatalogEntry {
    CatalogEntry {
        symbol,
        name,
        asset_class: AssetClass::Crypto,
        coingecko_id: Some(id),
        fallback_price: fallback,
    }
}

pub static POPULAR_STOCKS: [CatalogEntry; 15] = [
    stock("AAPL", "Apple"),
    stock("MSFT", "Microsoft"),
    stock("GOOGL", "Google"),
    stock("AMZN", "Amazon"),
    stock("NVDA", "NVIDIA"),
    stock("TSLA", "Tesla"),
    stock("META", "Meta"),
    stock("BRK.B", "Berkshire Hathaway"),
    stock("V", "Visa"),
    stock("JPM", "JPMorgan Chase"),
    stock("WMT", "Walmart"),
    stock("MA", "Mastercard"),
    stock("PG", "Procter & Gamble"),
    stock("UNH", "UnitedHealth"),
    stock("HD", "Home Depot"),
];

/// Coins above $1B market cap, with last-resort prices.
pub static POPULAR_CRYPTO: [CatalogEntry; 18] = [
    coin("bitcoin", "BTC", "Bitcoin", dec!(45000)),
    coin("ethereum", "ETH", "Ethereum", dec!(2500)),
    coin("binancecoin", "BNB", "BNB", dec!(320)),
    coin("solana", "SOL", "Solana", dec!(110)),
    coin("ripple", "XRP", "XRP", dec!(0.52)),
    coin("cardano", "ADA", "Cardano", dec!(0.48)),
    coin("dogecoin", "DOGE", "Dogecoin", dec!(0.085)),
    coin("avalanche-2", "AVAX", "Avalanche", dec!(38)),
    coin("polkadot", "DOT", "Polkadot", dec!(7.2)),
    coin("matic-network", "MATIC", "Polygon", dec!(0.85)),
    coin("chainlink", "LINK", "Chainlink", dec!(15.5)),
    coin("uniswap", "UNI", "Uniswap", dec!(6.8)),
    coin("litecoin", "LTC", "Litecoin", dec!(72)),
    coin("stellar", "XLM", "Stellar", dec!(0.12)),
    coin("monero", "XMR", "Monero", dec!(165)),
    coin("algorand", "ALGO", "Algorand", dec!(0.22)),
    coin("cosmos", "ATOM", "Cosmos", dec!(9.5)),
    coin("near", "NEAR", "NEAR Protocol", dec!(4.2)),
];

pub fn entries(class: AssetClass) -> &'static [CatalogEntry] {
    match class {
        AssetClass::Stock => &POPULAR_STOCKS,
        AssetClass::Crypto => &POPULAR_CRYPTO,
    }
}

/// Find an entry by ticker symbol (case-insensitive).
pub fn lookup(symbol: &str) -> Option<&'static CatalogEntry> {
    POPULAR_STOCKS
        .iter()
        .chain(POPULAR_CRYPTO.iter())
        .find(|e| e.symbol.eq_ignore_ascii_case(symbol))
}

/// Asset class of a known symbol.
pub fn classify(symbol: &str) -> Option<AssetClass> {
    lookup(symbol).map(|e| e.asset_class)
}

/// Last-resort price for a symbol. Unknown symbols get the stock fallback.
pub fn fallback_price(symbol: &str) -> Decimal {
    lookup(symbol)
        .map(|e| e.fallback_price)
        .unwrap_or(STOCK_FALLBACK_PRICE)
}
