//! Portfolio returns, winner determination and XP.
//!
//! ## Returns
//!
//! ```text
//! shares  = amount / basis_price
//! value   = shares * current_price      (current falls back to basis)
//!         = amount * current_price / basis_price
//! return% = (sum(value) - 1_000_000) / 1_000_000 * 100
//! ```
//!
//! ## XP
//!
//! ```text
//! winner = floor(100 + min(margin * 10, 100))
//! loser  = 25
//! draw   = 25 each
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::asset::{PortfolioAsset, PriceMap};
use crate::portfolio::NOTIONAL;

pub const BASE_XP_WIN: u32 = 100;
pub const BASE_XP_LOSS: u32 = 25;
pub const MAX_BONUS_XP: u32 = 100;
pub const XP_PER_MARGIN_POINT: Decimal = dec!(10);

/// Round half away from zero to 2 dp.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Return in percent using each position's own `price` as cost basis.
pub fn calculate_portfolio_return(portfolio: &[PortfolioAsset], prices: &PriceMap) -> Decimal {
    portfolio_return_with(portfolio, |a| a.price, prices)
}

/// Return in percent against an explicit basis snapshot (the battle's
/// locked starting prices). Symbols missing from `basis` use the
/// position's own price.
pub fn portfolio_return(portfolio: &[PortfolioAsset], basis: &PriceMap, prices: &PriceMap) -> Decimal {
    portfolio_return_with(
        portfolio,
        |a| basis.get(&a.symbol).copied().unwrap_or(a.price),
        prices,
    )
}

fn portfolio_return_with<F>(portfolio: &[PortfolioAsset], basis_of: F, prices: &PriceMap) -> Decimal
where
    F: Fn(&PortfolioAsset) -> Decimal,
{
    if portfolio.is_empty() {
        return Decimal::ZERO;
    }

    let current_total = portfolio
        .iter()
        .map(|asset| position_value(asset, basis_of(asset), prices))
        .fold(Decimal::ZERO, |total, value| {
            total.checked_add(value).unwrap_or(Decimal::MAX)
        });

    (current_total - NOTIONAL) / NOTIONAL * dec!(100)
}

/// Current value of one position. A missing or unusable basis, or a value
/// too large for `Decimal`, holds the position flat.
fn position_value(asset: &PortfolioAsset, basis: Decimal, prices: &PriceMap) -> Decimal {
    if basis <= Decimal::ZERO {
        return asset.amount;
    }
    let current = prices.get(&asset.symbol).copied().unwrap_or(basis);
    // multiply first so an unchanged price returns the amount exactly
    match asset
        .amount
        .checked_mul(current)
        .and_then(|v| v.checked_div(basis))
    {
        Some(value) => value,
        None => {
            tracing::warn!(
                symbol = %asset.symbol,
                basis = %basis,
                current = %current,
                "position value out of range, holding flat"
            );
            asset.amount
        }
    }
}

/// Which side came out ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    CreatorWon,
    OpponentWon,
    Draw,
}

/// Strictly greater return wins; exact equality is a draw.
pub fn determine_outcome(creator_return: Decimal, opponent_return: Decimal) -> Outcome {
    match creator_return.cmp(&opponent_return) {
        std::cmp::Ordering::Greater => Outcome::CreatorWon,
        std::cmp::Ordering::Less => Outcome::OpponentWon,
        std::cmp::Ordering::Equal => Outcome::Draw,
    }
}

/// XP for one side. `margin` is in percentage points.
pub fn calculate_xp(won: bool, margin: Decimal) -> u32 {
    if !won {
        return BASE_XP_LOSS;
    }
    let bonus = (margin.abs() * XP_PER_MARGIN_POINT).min(Decimal::from(MAX_BONUS_XP));
    (Decimal::from(BASE_XP_WIN) + bonus)
        .floor()
        .to_u32()
        .unwrap_or(BASE_XP_WIN + MAX_BONUS_XP)
}
