//! Request and response bodies.
//!
//! All JSON is camelCase. Decimals travel as strings and are accepted as
//! strings or numbers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradeseven_core::{Allocation, AssetClass, Battle, Rank, StatsUpdate, UserProfile};
use tradeseven_core::{PriceMap, Standings};
use tradeseven_engine::{BattlePrices, BattleView};
use tradeseven_market::catalog;

// =============================================================================
// Users
// =============================================================================

/// Login: names a player, creating their profile on first use.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub battles_played: u32,
    pub xp: u64,
    pub rank: Rank,
    pub next_rank: Option<Rank>,
    /// XP still needed for the next tier; absent at the top tier.
    pub xp_to_next_rank: Option<u64>,
    pub created_at: DateTime<Utc>,
    /// Stat changes applied while serving this request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<StatsUpdate>,
}

impl ProfileResponse {
    pub fn new(profile: UserProfile, updates: Vec<StatsUpdate>) -> Self {
        let rank = profile.rank();
        let next_rank = rank.next();
        Self {
            wins: profile.wins,
            losses: profile.losses,
            draws: profile.draws,
            battles_played: profile.battles_played(),
            xp: profile.xp,
            rank,
            next_rank,
            xp_to_next_rank: next_rank.map(|r| r.min_xp().saturating_sub(profile.xp)),
            created_at: profile.created_at,
            username: profile.username,
            updates,
        }
    }
}

// =============================================================================
// Battles
// =============================================================================

/// One pick from the client. Only symbol and percentage are required; the
/// rest is filled in from the asset catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    /// Quote the client saw when picking; zero means "use the catalog".
    #[serde(default)]
    pub price: Decimal,
    pub percentage: Decimal,
}

impl From<&AllocationRequest> for Allocation {
    fn from(req: &AllocationRequest) -> Self {
        Allocation {
            symbol: req.symbol.clone(),
            name: req.name.clone(),
            // unknown symbols are rejected by the engine
            asset_class: catalog::classify(&req.symbol).unwrap_or(AssetClass::Stock),
            price: req.price,
            percentage: req.percentage,
        }
    }
}

pub fn to_allocations(reqs: &[AllocationRequest]) -> Vec<Allocation> {
    reqs.iter().map(Allocation::from).collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleRequest {
    pub username: String,
    pub portfolio_name: String,
    pub allocations: Vec<AllocationRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBattleRequest {
    pub username: String,
    pub code: String,
    pub allocations: Vec<AllocationRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleListResponse {
    pub battles: Vec<BattleView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub battles: Vec<Battle>,
}

/// A battle with its derived status plus current prices and standings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleDetailResponse {
    #[serde(flatten)]
    pub view: BattleView,
    pub prices: PriceMap,
    pub live_prices: bool,
    pub standings: Option<Standings>,
}

impl BattleDetailResponse {
    pub fn new(view: BattleView, prices: BattlePrices) -> Self {
        Self {
            view,
            prices: prices.prices,
            live_prices: prices.live,
            standings: prices.standings,
        }
    }
}
