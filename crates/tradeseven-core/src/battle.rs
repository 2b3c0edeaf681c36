//! The battle record and its one-shot transitions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::{unique_assets, PortfolioAsset, PriceMap};

/// Battle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BattleId(pub Uuid);

impl BattleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for BattleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status. Stored on the record for display, but the
/// authoritative value always comes from [`crate::derive_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    Waiting,
    Active,
    Completed,
}

impl fmt::Display for BattleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Final outcome, written once at settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleResult {
    /// `None` on a draw.
    pub winner: Option<String>,
    pub loser: Option<String>,
    #[serde(default)]
    pub is_draw: bool,
    /// Percent return, rounded to 2 dp.
    pub creator_return: Decimal,
    pub opponent_return: Decimal,
    /// Absolute difference of the returns in percentage points, 2 dp.
    pub margin: Decimal,
    /// username → XP earned from this battle
    pub xp_awarded: BTreeMap<String, u32>,
}

impl BattleResult {
    pub fn xp_for(&self, username: &str) -> u32 {
        self.xp_awarded.get(username).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Battle {
    pub id: BattleId,
    pub challenge_code: String,
    pub creator: String,
    pub opponent: Option<String>,
    pub creator_portfolio: Vec<PortfolioAsset>,
    pub opponent_portfolio: Option<Vec<PortfolioAsset>>,
    pub portfolio_name: String,
    pub status: BattleStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub starting_prices: Option<PriceMap>,
    #[serde(default)]
    pub ending_prices: Option<PriceMap>,
    #[serde(default)]
    pub result: Option<BattleResult>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Battle {
    /// A fresh battle waiting for an opponent.
    pub fn new(
        creator: impl Into<String>,
        creator_portfolio: Vec<PortfolioAsset>,
        portfolio_name: impl Into<String>,
        challenge_code: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BattleId::new(),
            challenge_code: challenge_code.into(),
            creator: creator.into(),
            opponent: None,
            creator_portfolio,
            opponent_portfolio: None,
            portfolio_name: portfolio_name.into(),
            status: BattleStatus::Waiting,
            start_date: None,
            end_date: None,
            starting_prices: None,
            ending_prices: None,
            result: None,
            created_at: now,
            completed_at: None,
            archived_at: None,
        }
    }

    pub fn is_participant(&self, username: &str) -> bool {
        self.creator == username || self.opponent.as_deref() == Some(username)
    }

    pub fn is_settled(&self) -> bool {
        self.result.is_some()
    }

    pub fn opponent_portfolio(&self) -> &[PortfolioAsset] {
        self.opponent_portfolio.as_deref().unwrap_or(&[])
    }

    /// Both portfolios' positions, deduplicated by symbol.
    pub fn unique_assets(&self) -> Vec<&PortfolioAsset> {
        unique_assets([self.creator_portfolio.as_slice(), self.opponent_portfolio()])
    }

    /// Cost basis for `symbol`: the locked starting price when present,
    /// else the price stored on the position.
    pub fn basis_price(&self, asset: &PortfolioAsset) -> Decimal {
        self.starting_prices
            .as_ref()
            .and_then(|p| p.get(&asset.symbol))
            .copied()
            .unwrap_or(asset.price)
    }

    /// Lock prices and start the clock.
    ///
    /// `starting_prices` must cover the union of both portfolios; any symbol
    /// missing from it keeps its own price. Both portfolios' `price` fields
    /// are rewritten to the locked value.
    pub fn activate(
        &mut self,
        opponent: impl Into<String>,
        opponent_portfolio: Vec<PortfolioAsset>,
        mut starting_prices: PriceMap,
        now: DateTime<Utc>,
        duration: Duration,
    ) {
        for asset in self.creator_portfolio.iter().chain(opponent_portfolio.iter()) {
            starting_prices.entry(asset.symbol.clone()).or_insert(asset.price);
        }

        let relock = |portfolio: &mut Vec<PortfolioAsset>| {
            for asset in portfolio.iter_mut() {
                if let Some(price) = starting_prices.get(&asset.symbol) {
                    asset.price = *price;
                }
            }
        };

        let mut opponent_portfolio = opponent_portfolio;
        relock(&mut self.creator_portfolio);
        relock(&mut opponent_portfolio);

        self.opponent = Some(opponent.into());
        self.opponent_portfolio = Some(opponent_portfolio);
        self.start_date = Some(now);
        self.end_date = Some(now + duration);
        self.starting_prices = Some(starting_prices);
        self.status = BattleStatus::Active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetClass;
    use rust_decimal_macros::dec;

    fn pos(symbol: &str, price: Decimal) -> PortfolioAsset {
        PortfolioAsset {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            asset_class: AssetClass::Stock,
            price,
            amount: dec!(500000),
        }
    }

    #[test]
    fn test_new_battle_is_waiting() {
        let now = Utc::now();
        let battle = Battle::new("alice", vec![pos("AAPL", dec!(190))], "Tech", "ABC234", now);
        assert_eq!(battle.status, BattleStatus::Waiting);
        assert!(battle.opponent.is_none());
        assert!(battle.is_participant("alice"));
        assert!(!battle.is_participant("bob"));
        assert_eq!(battle.created_at, now);
    }

    #[test]
    fn test_activate_locks_prices_on_both_sides() {
        let now = Utc::now();
        let mut battle = Battle::new(
            "alice",
            vec![pos("AAPL", dec!(190)), pos("MSFT", dec!(400))],
            "Tech",
            "ABC234",
            now,
        );
        let mut prices = PriceMap::new();
        prices.insert("AAPL".into(), dec!(195));
        prices.insert("NVDA".into(), dec!(900));

        battle.activate(
            "bob",
            vec![pos("AAPL", dec!(180)), pos("NVDA", dec!(850))],
            prices,
            now,
            Duration::hours(24),
        );

        assert_eq!(battle.status, BattleStatus::Active);
        assert_eq!(battle.opponent.as_deref(), Some("bob"));
        assert_eq!(battle.end_date, Some(now + Duration::hours(24)));
        let locked = battle.starting_prices.as_ref().unwrap();
        // MSFT had no fetched price and keeps its own
        assert_eq!(locked["MSFT"], dec!(400));
        assert_eq!(locked.len(), 3);
        for asset in battle.creator_portfolio.iter().chain(battle.opponent_portfolio()) {
            assert_eq!(asset.price, locked[&asset.symbol]);
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let battle = Battle::new("alice", vec![pos("AAPL", dec!(190))], "Tech", "ABC234", Utc::now());
        let json = serde_json::to_value(&battle).unwrap();
        assert!(json.get("challengeCode").is_some());
        assert!(json.get("creatorPortfolio").is_some());
        assert_eq!(json["status"], "waiting");
        assert!(json.get("archivedAt").is_none());
    }
}
