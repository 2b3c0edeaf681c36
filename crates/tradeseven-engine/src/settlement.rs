//! The settlement pass.

use chrono::{DateTime, Utc};

use tradeseven_core::{needs_settlement, settle_battle, Battle};
use tradeseven_market::{fetch_prices, BatchConfig, PriceSource};

/// Settle every battle in `battles` that is joined, past its end date and
/// still without a result.
///
/// Ending prices are fetched per battle; any symbol whose lookup fails is
/// recorded at its locked starting price. Battles that already carry a
/// result, and battles that are not due, are returned unchanged.
pub async fn run_settlement_pass(
    battles: Vec<Battle>,
    now: DateTime<Utc>,
    source: &dyn PriceSource,
    batch: &BatchConfig,
) -> Vec<Battle> {
    let mut out = Vec::with_capacity(battles.len());
    for battle in battles {
        if !needs_settlement(&battle, now) {
            out.push(battle);
            continue;
        }

        tracing::info!(battle_id = %battle.id, "settling expired battle");
        let ending = fetch_prices(source, battle.unique_assets(), batch).await;
        out.push(settle_battle(&battle, ending, now));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tradeseven_core::{AssetClass, PortfolioAsset, PriceMap};
    use tradeseven_market::StaticPriceSource;

    fn battle(now: DateTime<Utc>) -> Battle {
        let asset = |s: &str| PortfolioAsset {
            symbol: s.into(),
            name: s.into(),
            asset_class: AssetClass::Crypto,
            price: dec!(10),
            amount: dec!(1000000),
        };
        let mut b = Battle::new("alice", vec![asset("SOL")], "Coins", "ZXCV23", now);
        b.activate("bob", vec![asset("ADA")], PriceMap::new(), now, Duration::hours(1));
        b
    }

    #[tokio::test]
    async fn test_pass_settles_due_and_is_idempotent() {
        let start = Utc::now() - Duration::hours(2);
        let source = StaticPriceSource::with_prices([("SOL", dec!(12)), ("ADA", dec!(9))]);
        let batch = BatchConfig::default();
        let now = Utc::now();

        let waiting = Battle::new("carol", Vec::new(), "Idle", "WAIT23", now);
        let first = run_settlement_pass(vec![battle(start), waiting.clone()], now, &source, &batch).await;
        let result = first[0].result.clone().unwrap();
        assert_eq!(result.winner.as_deref(), Some("alice"));
        assert_eq!(result.margin, dec!(30));
        assert_eq!(first[1], waiting);

        source.set_price("SOL", dec!(1));
        let second = run_settlement_pass(first.clone(), now + Duration::minutes(5), &source, &batch).await;
        assert_eq!(second, first);
    }
}
