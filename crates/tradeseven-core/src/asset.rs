//! Asset classes and portfolio positions.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Symbol → price snapshot.
pub type PriceMap = HashMap<String, Decimal>;

/// What kind of market an asset trades on.
///
/// Resolved once when the asset enters a portfolio and carried on the
/// position from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Crypto,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "stocks",
            Self::Crypto => "crypto",
        }
    }

    /// Parse the path/query form used by clients (`stocks`, `crypto`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "stocks" => Some(Self::Stock),
            "crypto" => Some(Self::Crypto),
            _ => None,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single position in a battle portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAsset {
    pub symbol: String,
    pub name: String,
    pub asset_class: AssetClass,
    /// Price when the asset was picked; rewritten to the locked starting
    /// price when the battle activates.
    pub price: Decimal,
    /// Dollar allocation out of the notional portfolio.
    pub amount: Decimal,
}

/// Collect the distinct symbols of several portfolios, first occurrence wins.
pub fn unique_assets<'a, I>(portfolios: I) -> Vec<&'a PortfolioAsset>
where
    I: IntoIterator<Item = &'a [PortfolioAsset]>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for portfolio in portfolios {
        for asset in portfolio {
            if seen.insert(asset.symbol.as_str()) {
                out.push(asset);
            }
        }
    }
    out
}
