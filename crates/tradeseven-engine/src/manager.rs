//! The battle lifecycle manager.
//!
//! Every mutating operation follows the same shape: validate and fetch
//! prices without holding the write lock, then take the lock, re-read the
//! shared battle list, re-check the precondition against the fresh copy and
//! write once. Two managers sharing one store (two processes) can still
//! race between their read and write; settlement stays correct because
//! results are only merged into records that are still unsettled.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use tradeseven_core::{
    build_portfolio, current_day, derive_status, format_time_remaining, generate_challenge_code,
    live_standings, merge_settlements, normalize_code, portfolio_class, prune_stale_waiting, Allocation,
    AssetClass, Battle, BattleId, BattleStatus, CoreError, PortfolioError, PriceMap, Standings, StatsUpdate,
    UserProfile,
};
use tradeseven_market::{catalog, fetch_prices, BatchConfig, MarketAsset, PriceSource, QuoteCache};
use tradeseven_store::{same_battles, BattleStore, HistoryStore, ProfileStore};

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, EngineResult};
use crate::settlement::run_settlement_pass;

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub battle_duration: Duration,
    /// How long an unjoined challenge stays open.
    pub waiting_ttl: Duration,
    pub batch: BatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            battle_duration: Duration::hours(24),
            waiting_ttl: Duration::hours(24),
            batch: BatchConfig::default(),
        }
    }
}

/// A battle as shown to a client: the stored record plus everything
/// derived from the clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleView {
    #[serde(flatten)]
    pub battle: Battle,
    /// Derived status; overrides the stored one.
    pub derived_status: BattleStatus,
    pub time_remaining: String,
    pub current_day: i64,
}

impl BattleView {
    pub fn new(battle: Battle, now: DateTime<Utc>) -> Self {
        Self {
            derived_status: derive_status(&battle, now),
            time_remaining: format_time_remaining(&battle, now),
            current_day: current_day(&battle, now),
            battle,
        }
    }
}

/// Prices and standings for one battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattlePrices {
    pub battle_id: BattleId,
    pub status: BattleStatus,
    /// Ending prices once completed, live prices while active, the
    /// creator's picked prices while waiting.
    pub prices: PriceMap,
    /// `true` when `prices` were fetched just now.
    pub live: bool,
    pub standings: Option<Standings>,
}

/// Outcome of one settlement pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    /// Battles this pass wrote a result for.
    pub settled: Vec<BattleId>,
    /// Stat changes applied to the viewer, if one was given.
    pub viewer_updates: Vec<StatsUpdate>,
}

pub struct BattleManager {
    battles: Arc<dyn BattleStore>,
    profiles: Arc<dyn ProfileStore>,
    history: Arc<dyn HistoryStore>,
    prices: Arc<dyn PriceSource>,
    quotes: QuoteCache,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    write_lock: Mutex<()>,
}

impl BattleManager {
    pub fn new(
        battles: Arc<dyn BattleStore>,
        profiles: Arc<dyn ProfileStore>,
        history: Arc<dyn HistoryStore>,
        prices: Arc<dyn PriceSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            battles,
            profiles,
            history,
            prices,
            quotes: QuoteCache::new(),
            clock: Arc::new(SystemClock),
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open a new challenge.
    pub async fn create_battle(
        &self,
        creator: &str,
        allocations: &[Allocation],
        name: &str,
    ) -> EngineResult<Battle> {
        let creator = require_username(creator)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::MissingName.into());
        }
        let portfolio = build_portfolio(&resolve_allocations(allocations, &self.quotes)?)?;

        let _guard = self.write_lock.lock().await;
        let now = self.now();
        let mut battles = self.battles.load_all().await?;
        let code = generate_challenge_code(&mut rand::thread_rng(), &battles, now);
        let battle = Battle::new(creator, portfolio, name, code, now);
        battles.push(battle.clone());
        self.battles.save_all(&battles).await?;

        tracing::info!(
            battle_id = %battle.id,
            creator = %battle.creator,
            code = %battle.challenge_code,
            "battle created"
        );
        Ok(battle)
    }

    /// Join a waiting battle by challenge code, locking prices and starting
    /// the clock.
    pub async fn join_battle(
        &self,
        code: &str,
        joiner: &str,
        allocations: &[Allocation],
    ) -> EngineResult<Battle> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(CoreError::MissingCode.into());
        }
        let joiner = require_username(joiner)?;
        let portfolio = build_portfolio(&resolve_allocations(allocations, &self.quotes)?)?;

        let now = self.now();
        let battles = self.battles.load_all().await?;
        let target = battles
            .iter()
            .find(|b| is_joinable(b, &code, now))
            .ok_or_else(|| CoreError::NotFound(code.clone()))?;

        if target.creator == joiner {
            return Err(CoreError::SelfJoin.into());
        }
        let required = portfolio_class(&target.creator_portfolio);
        let provided = portfolio_class(&portfolio);
        if required != provided {
            return Err(CoreError::TypeMismatch {
                required: class_label(required),
                provided: class_label(provided),
            }
            .into());
        }

        // fetch outside the lock; both portfolios' symbols, once each
        let starting = fetch_prices(
            self.prices.as_ref(),
            target.creator_portfolio.iter().chain(portfolio.iter()),
            &self.config.batch,
        )
        .await;
        let battle_id = target.id;

        let _guard = self.write_lock.lock().await;
        let now = self.now();
        let mut battles = self.battles.load_all().await?;
        let battle = battles
            .iter_mut()
            .find(|b| b.id == battle_id && is_joinable(b, &code, now))
            .ok_or_else(|| CoreError::NotFound(code.clone()))?;

        battle.activate(joiner, portfolio, starting, now, self.config.battle_duration);
        let joined = battle.clone();
        self.battles.save_all(&battles).await?;

        tracing::info!(
            battle_id = %joined.id,
            creator = %joined.creator,
            opponent = joiner,
            ends_at = ?joined.end_date,
            "battle joined"
        );
        Ok(joined)
    }

    /// Settle every expired battle. When `viewer` is given and took part in
    /// a settled battle, their profile is updated too; everyone else is
    /// picked up by [`BattleManager::reconcile_profile`].
    pub async fn settle_due(&self, viewer: Option<&str>) -> EngineResult<SettlementReport> {
        let now = self.now();
        let loaded = self.battles.load_all().await?;
        let mut report = SettlementReport::default();

        if loaded.iter().any(|b| tradeseven_core::needs_settlement(b, now)) {
            let computed =
                run_settlement_pass(loaded, now, self.prices.as_ref(), &self.config.batch).await;

            let _guard = self.write_lock.lock().await;
            let fresh = self.battles.load_all().await?;
            let (merged, applied) = merge_settlements(fresh.clone(), &computed);
            if !applied.is_empty() && !same_battles(&fresh, &merged) {
                self.battles.save_all(&merged).await?;
                tracing::info!(count = applied.len(), "settlement results written");
            }
            report.settled = applied;
        } else {
            tracing::debug!("no battles due for settlement");
        }

        if let Some(viewer) = viewer {
            let (_, updates) = self.reconcile_profile(viewer).await?;
            report.viewer_updates = updates;
        }
        Ok(report)
    }

    /// Move a settled battle into the participant's history.
    ///
    /// The history append and the removal from the live list succeed or
    /// fail together: if the removal cannot be written, an entry this call
    /// added to history is taken back out.
    pub async fn archive_battle(&self, id: BattleId, username: &str) -> EngineResult<Battle> {
        let _guard = self.write_lock.lock().await;
        let now = self.now();
        let mut battles = self.battles.load_all().await?;
        let battle = battles
            .iter()
            .find(|b| b.id == id)
            .ok_or(EngineError::BattleNotFound(id))?;

        if !battle.is_participant(username) {
            return Err(EngineError::NotParticipant {
                battle_id: id,
                username: username.to_string(),
            });
        }
        if derive_status(battle, now) != BattleStatus::Completed || !battle.is_settled() {
            return Err(EngineError::NotSettled(id));
        }

        let mut archived = battle.clone();
        archived.archived_at = Some(now);
        archived.status = BattleStatus::Completed;
        let appended = self.history.append_history(&archived).await?;
        if !appended {
            tracing::debug!(battle_id = %id, "battle already in history");
        }

        battles.retain(|b| b.id != id);
        if let Err(e) = self.battles.save_all(&battles).await {
            if appended {
                if let Err(undo) = self.history.remove_history(id).await {
                    tracing::warn!(battle_id = %id, error = %undo, "could not undo history append");
                }
            }
            return Err(e.into());
        }

        tracing::info!(battle_id = %id, user = username, "battle archived");
        Ok(archived)
    }

    /// Remove challenges nobody joined within the TTL.
    pub async fn prune_stale_challenges(&self) -> EngineResult<usize> {
        let _guard = self.write_lock.lock().await;
        let now = self.now();
        let mut battles = self.battles.load_all().await?;
        let removed = prune_stale_waiting(&mut battles, now, self.config.waiting_ttl);
        if removed > 0 {
            self.battles.save_all(&battles).await?;
            tracing::info!(removed, "pruned stale challenges");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Load a profile, creating it on first login.
    pub async fn ensure_profile(&self, username: &str) -> EngineResult<UserProfile> {
        let username = require_username(username)?;
        if let Some(profile) = self.profiles.load(username).await? {
            return Ok(profile);
        }
        let profile = UserProfile::new(username, self.now());
        self.profiles.save(&profile).await?;
        tracing::info!(user = username, "profile created");
        Ok(profile)
    }

    /// Load an existing profile without creating one.
    pub async fn profile(&self, username: &str) -> EngineResult<UserProfile> {
        let username = require_username(username)?;
        self.profiles
            .load(username)
            .await?
            .ok_or_else(|| EngineError::UserNotFound(username.to_string()))
    }

    /// Count every settled battle (live or archived) the user has not been
    /// credited for yet.
    pub async fn reconcile_profile(&self, username: &str) -> EngineResult<(UserProfile, Vec<StatsUpdate>)> {
        let mut profile = self.ensure_profile(username).await?;
        let live = self.battles.load_all().await?;
        let archived = self.history.load_history(&profile.username).await?;

        let updates: Vec<StatsUpdate> = live
            .iter()
            .chain(archived.iter())
            .filter_map(|b| profile.apply_battle(b))
            .collect();

        if !updates.is_empty() {
            self.profiles.save(&profile).await?;
            tracing::info!(
                user = %profile.username,
                battles = updates.len(),
                xp = profile.xp,
                rank = %profile.rank(),
                "profile reconciled"
            );
        }
        Ok((profile, updates))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_battle(&self, id: BattleId) -> EngineResult<BattleView> {
        let battles = self.battles.load_all().await?;
        let battle = battles
            .into_iter()
            .find(|b| b.id == id)
            .ok_or(EngineError::BattleNotFound(id))?;
        Ok(BattleView::new(battle, self.now()))
    }

    /// Live battles `username` takes part in, newest first.
    pub async fn battles_for(&self, username: &str) -> EngineResult<Vec<BattleView>> {
        let now = self.now();
        let mut mine: Vec<BattleView> = self
            .battles
            .load_all()
            .await?
            .into_iter()
            .filter(|b| b.is_participant(username))
            .map(|b| BattleView::new(b, now))
            .collect();
        mine.sort_by(|a, b| b.battle.created_at.cmp(&a.battle.created_at));
        Ok(mine)
    }

    pub async fn load_history(&self, username: &str) -> EngineResult<Vec<Battle>> {
        Ok(self.history.load_history(username).await?)
    }

    /// Prices and standings for a battle.
    pub async fn battle_prices(&self, id: BattleId) -> EngineResult<BattlePrices> {
        let view = self.get_battle(id).await?;
        let battle = &view.battle;

        let (prices, live) = match (view.derived_status, &battle.ending_prices) {
            (BattleStatus::Completed, Some(ending)) => (ending.clone(), false),
            (BattleStatus::Waiting, _) => (
                battle
                    .creator_portfolio
                    .iter()
                    .map(|a| (a.symbol.clone(), a.price))
                    .collect(),
                false,
            ),
            _ => (
                fetch_prices(self.prices.as_ref(), battle.unique_assets(), &self.config.batch).await,
                true,
            ),
        };

        let standings = battle
            .opponent
            .is_some()
            .then(|| live_standings(battle, &prices));

        Ok(BattlePrices {
            battle_id: id,
            status: view.derived_status,
            prices,
            live,
            standings,
        })
    }

    // ------------------------------------------------------------------
    // Market
    // ------------------------------------------------------------------

    pub fn market(&self, class: AssetClass) -> Vec<MarketAsset> {
        self.quotes.market(class)
    }

    /// Refresh cached quotes for both asset classes.
    pub async fn refresh_market(&self) -> usize {
        let mut live = 0;
        for class in [AssetClass::Stock, AssetClass::Crypto] {
            live += self
                .quotes
                .refresh(self.prices.as_ref(), class, &self.config.batch, self.now())
                .await;
        }
        live
    }
}

fn require_username(username: &str) -> EngineResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CoreError::MissingUsername.into());
    }
    Ok(username)
}

fn is_joinable(battle: &Battle, code: &str, now: DateTime<Utc>) -> bool {
    battle.challenge_code == code
        && battle.opponent.is_none()
        && derive_status(battle, now) == BattleStatus::Waiting
}

fn class_label(class: Option<AssetClass>) -> String {
    class.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// How far a client-supplied price may stray from the reference quote, as a
/// factor either way.
const MAX_PRICE_DEVIATION: Decimal = dec!(100);

/// Resolve each allocation against the catalog: the symbol must be known,
/// and its asset class is taken from the catalog. A client price is kept
/// only when it lies within [`MAX_PRICE_DEVIATION`] of the cached quote (or
/// the catalog fallback); otherwise the reference price is used.
fn resolve_allocations(allocations: &[Allocation], quotes: &QuoteCache) -> Result<Vec<Allocation>, PortfolioError> {
    allocations
        .iter()
        .map(|a| -> Result<Allocation, PortfolioError> {
            let entry = catalog::lookup(&a.symbol)
                .ok_or_else(|| PortfolioError::UnknownAsset(a.symbol.clone()))?;
            let reference = quotes
                .get(entry.symbol)
                .map(|q| q.price)
                .filter(|p| *p > Decimal::ZERO)
                .unwrap_or(entry.fallback_price);
            Ok(Allocation {
                symbol: entry.symbol.to_string(),
                name: if a.name.trim().is_empty() {
                    entry.name.to_string()
                } else {
                    a.name.clone()
                },
                asset_class: entry.asset_class,
                price: plausible_price(entry.symbol, a.price, reference),
                percentage: a.percentage,
            })
        })
        .collect()
}

fn plausible_price(symbol: &str, claimed: Decimal, reference: Decimal) -> Decimal {
    if claimed <= Decimal::ZERO {
        return reference;
    }
    let in_band = claimed
        .checked_mul(MAX_PRICE_DEVIATION)
        .map_or(true, |upper| upper >= reference)
        && reference
            .checked_mul(MAX_PRICE_DEVIATION)
            .map_or(true, |upper| claimed <= upper);
    if in_band {
        claimed
    } else {
        tracing::warn!(symbol, claimed = %claimed, reference = %reference, "implausible client price replaced");
        reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_allocations_uses_catalog() {
        let allocs = vec![Allocation {
            symbol: "btc".into(),
            name: String::new(),
            asset_class: AssetClass::Stock,
            price: dec!(0),
            percentage: dec!(10),
        }];
        let resolved = resolve_allocations(&allocs, &QuoteCache::new()).unwrap();
        assert_eq!(resolved[0].symbol, "BTC");
        assert_eq!(resolved[0].name, "Bitcoin");
        assert_eq!(resolved[0].asset_class, AssetClass::Crypto);
        assert_eq!(resolved[0].price, dec!(45000));
    }

    #[test]
    fn test_implausible_client_price_is_replaced() {
        let quotes = QuoteCache::new();
        quotes.insert(tradeseven_market::Quote::flat("NVDA", dec!(900)), true, Utc::now());
        let alloc = |symbol: &str, price: Decimal| Allocation {
            symbol: symbol.into(),
            name: String::new(),
            asset_class: AssetClass::Stock,
            price,
            percentage: dec!(10),
        };
        let allocs = vec![
            alloc("NVDA", dec!(1000000000000000000000000)),
            alloc("NVDA", dec!(0.5)),
            alloc("NVDA", dec!(905.25)),
            alloc("AAPL", dec!(10001)),
            alloc("AAPL", dec!(187.5)),
        ];
        let prices: Vec<Decimal> = resolve_allocations(&allocs, &quotes)
            .unwrap()
            .into_iter()
            .map(|a| a.price)
            .collect();
        // AAPL has no cached quote and is checked against the catalog fallback
        assert_eq!(prices, vec![dec!(900), dec!(900), dec!(905.25), dec!(100), dec!(187.5)]);
    }

    #[test]
    fn test_unknown_symbol_rejected() {
        let allocs = vec![Allocation {
            symbol: "NOPE".into(),
            name: "Nope".into(),
            asset_class: AssetClass::Stock,
            price: dec!(1),
            percentage: dec!(10),
        }];
        assert_eq!(
            resolve_allocations(&allocs, &QuoteCache::new()),
            Err(PortfolioError::UnknownAsset("NOPE".into()))
        );
    }
}
