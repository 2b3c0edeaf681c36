//! Settlement: turning an expired battle into a final result, and merging
//! settled records back into the shared battle list.
//!
//! Settlement is a pure function of the battle, the ending price snapshot
//! and the clock. Writes go through [`merge_settlements`], which only fills
//! in records that are still unsettled in the freshly read list, so two
//! processes settling the same battle cannot award XP twice.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::asset::PriceMap;
use crate::battle::{Battle, BattleId, BattleResult, BattleStatus};
use crate::scoring::{calculate_xp, determine_outcome, portfolio_return, round2, Outcome, BASE_XP_LOSS};
use crate::status::derive_status;

/// Both sides' returns against the locked starting prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standings {
    pub creator_return: Decimal,
    pub opponent_return: Decimal,
    /// Username currently ahead, `None` when level.
    pub leader: Option<String>,
    pub margin: Decimal,
}

/// Returns of both portfolios at `prices`, using the battle's starting
/// prices as cost basis. Symbols missing from `prices` are valued at basis.
pub fn live_standings(battle: &Battle, prices: &PriceMap) -> Standings {
    let empty = PriceMap::new();
    let basis = battle.starting_prices.as_ref().unwrap_or(&empty);
    let creator_return = portfolio_return(&battle.creator_portfolio, basis, prices);
    let opponent_return = portfolio_return(battle.opponent_portfolio(), basis, prices);

    let leader = match determine_outcome(creator_return, opponent_return) {
        Outcome::CreatorWon => Some(battle.creator.clone()),
        Outcome::OpponentWon => battle.opponent.clone(),
        Outcome::Draw => None,
    };

    Standings {
        creator_return: round2(creator_return),
        opponent_return: round2(opponent_return),
        leader,
        margin: round2((creator_return - opponent_return).abs()),
    }
}

/// Compute the final result of `battle` at `ending_prices`.
///
/// Every symbol of both portfolios gets an ending price; any symbol missing
/// from `ending_prices` is recorded at its locked starting price.
pub fn settle_battle(battle: &Battle, ending_prices: PriceMap, now: DateTime<Utc>) -> Battle {
    let mut ending = ending_prices;
    for asset in battle.unique_assets() {
        let basis = battle.basis_price(asset);
        ending.entry(asset.symbol.clone()).or_insert(basis);
    }

    let empty = PriceMap::new();
    let basis = battle.starting_prices.as_ref().unwrap_or(&empty);
    let creator_return = portfolio_return(&battle.creator_portfolio, basis, &ending);
    let opponent_return = portfolio_return(battle.opponent_portfolio(), basis, &ending);
    let margin = round2((creator_return - opponent_return).abs());

    let creator = battle.creator.clone();
    let opponent = battle.opponent.clone().unwrap_or_default();

    let mut xp_awarded = BTreeMap::new();
    let (winner, loser) = match determine_outcome(creator_return, opponent_return) {
        Outcome::CreatorWon => (Some(creator), Some(opponent)),
        Outcome::OpponentWon => (Some(opponent), Some(creator)),
        Outcome::Draw => {
            xp_awarded.insert(creator, BASE_XP_LOSS);
            xp_awarded.insert(opponent, BASE_XP_LOSS);
            (None, None)
        }
    };
    if let (Some(w), Some(l)) = (&winner, &loser) {
        xp_awarded.insert(w.clone(), calculate_xp(true, margin));
        xp_awarded.insert(l.clone(), calculate_xp(false, margin));
    }

    tracing::info!(
        battle_id = %battle.id,
        winner = winner.as_deref().unwrap_or("draw"),
        creator_return = %round2(creator_return),
        opponent_return = %round2(opponent_return),
        margin = %margin,
        "battle settled"
    );

    let mut settled = battle.clone();
    settled.result = Some(BattleResult {
        is_draw: winner.is_none(),
        winner,
        loser,
        creator_return: round2(creator_return),
        opponent_return: round2(opponent_return),
        margin,
        xp_awarded,
    });
    settled.ending_prices = Some(ending);
    settled.completed_at = Some(now);
    settled.status = BattleStatus::Completed;
    settled
}

/// Apply `settled` results onto a freshly read battle list.
///
/// A result is taken only where the fresh record has the same id, is still
/// unsettled and was activated with the same opponent and start date.
/// Returns the merged list and the ids whose results were applied.
pub fn merge_settlements(fresh: Vec<Battle>, settled: &[Battle]) -> (Vec<Battle>, Vec<BattleId>) {
    let by_id: HashMap<BattleId, &Battle> = settled.iter().map(|b| (b.id, b)).collect();
    let mut applied = Vec::new();

    let merged = fresh
        .into_iter()
        .map(|current| match by_id.get(&current.id) {
            Some(candidate)
                if current.result.is_none()
                    && candidate.result.is_some()
                    && current.opponent == candidate.opponent
                    && current.start_date == candidate.start_date =>
            {
                applied.push(current.id);
                (*candidate).clone()
            }
            _ => current,
        })
        .collect();

    (merged, applied)
}

/// Battles due for settlement: joined, expired and without a result.
pub fn due_for_settlement(battles: &[Battle], now: DateTime<Utc>) -> Vec<&Battle> {
    battles
        .iter()
        .filter(|b| crate::status::needs_settlement(b, now))
        .collect()
}

/// Drop waiting battles created more than `ttl` ago. Returns the number
/// removed.
pub fn prune_stale_waiting(battles: &mut Vec<Battle>, now: DateTime<Utc>, ttl: Duration) -> usize {
    let before = battles.len();
    battles.retain(|b| {
        derive_status(b, now) != BattleStatus::Waiting
            || b.opponent.is_some()
            || now - b.created_at <= ttl
    });
    before - battles.len()
}
