use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tradeseven_core::{Allocation, AssetClass, BattleStatus, CoreError, Rank};
use tradeseven_engine::{BattleManager, EngineConfig, EngineError, ManualClock};
use tradeseven_market::{BatchConfig, StaticPriceSource};
use tradeseven_store::{BattleStore, HistoryStore, InMemoryStore, ProfileStore};

struct Harness {
    store: Arc<InMemoryStore>,
    prices: Arc<StaticPriceSource>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with_source(StaticPriceSource::with_prices([
            ("AAPL", dec!(190)),
            ("MSFT", dec!(400)),
            ("GOOGL", dec!(140)),
            ("AMZN", dec!(150)),
            ("NVDA", dec!(900)),
            ("TSLA", dec!(250)),
            ("META", dec!(480)),
            ("V", dec!(270)),
            ("JPM", dec!(190)),
            ("WMT", dec!(60)),
            ("MA", dec!(450)),
            ("PG", dec!(160)),
            ("BTC", dec!(45000)),
            ("ETH", dec!(2500)),
            ("SOL", dec!(110)),
            ("XRP", dec!(0.5)),
            ("ADA", dec!(0.5)),
            ("DOGE", dec!(0.1)),
            ("DOT", dec!(7)),
        ]))
    }

    fn with_source(prices: StaticPriceSource) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            prices: Arc::new(prices),
            clock: Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 14, 0, 0).unwrap())),
        }
    }

    fn manager(&self) -> BattleManager {
        let config = EngineConfig {
            batch: BatchConfig {
                batch_size: 6,
                batch_delay: std::time::Duration::from_millis(1),
                lookup_timeout: std::time::Duration::from_secs(1),
            },
            ..EngineConfig::default()
        };
        BattleManager::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.prices.clone(),
            config,
        )
        .with_clock(self.clock.clone())
    }
}

fn allocations(class: AssetClass, picks: &[(&str, Decimal)]) -> Vec<Allocation> {
    picks
        .iter()
        .map(|(symbol, pct)| Allocation {
            symbol: symbol.to_string(),
            name: String::new(),
            asset_class: class,
            price: Decimal::ZERO,
            percentage: *pct,
        })
        .collect()
}

fn creator_stocks() -> Vec<Allocation> {
    allocations(
        AssetClass::Stock,
        &[
            ("AAPL", dec!(20)),
            ("MSFT", dec!(15)),
            ("GOOGL", dec!(15)),
            ("AMZN", dec!(10)),
            ("NVDA", dec!(15)),
            ("TSLA", dec!(15)),
            ("META", dec!(10)),
        ],
    )
}

fn opponent_stocks() -> Vec<Allocation> {
    allocations(
        AssetClass::Stock,
        &[
            ("AAPL", dec!(10)),
            ("V", dec!(15)),
            ("JPM", dec!(15)),
            ("WMT", dec!(15)),
            ("MA", dec!(15)),
            ("PG", dec!(15)),
            ("MSFT", dec!(15)),
        ],
    )
}

fn crypto() -> Vec<Allocation> {
    allocations(
        AssetClass::Crypto,
        &[
            ("BTC", dec!(20)),
            ("ETH", dec!(20)),
            ("SOL", dec!(15)),
            ("XRP", dec!(10)),
            ("ADA", dec!(10)),
            ("DOGE", dec!(10)),
            ("DOT", dec!(15)),
        ],
    )
}

#[tokio::test]
async fn create_join_settle_end_to_end() {
    let h = Harness::new();
    let manager = h.manager();

    let created = manager
        .create_battle("alice", &creator_stocks(), "Big Tech")
        .await
        .unwrap();
    assert_eq!(created.challenge_code.len(), 6);
    assert_eq!(
        manager.get_battle(created.id).await.unwrap().derived_status,
        BattleStatus::Waiting
    );

    let joined = manager
        .join_battle(&format!("  {} ", created.challenge_code.to_lowercase()), "bob", &opponent_stocks())
        .await
        .unwrap();
    assert_eq!(joined.opponent.as_deref(), Some("bob"));
    let starting = joined.starting_prices.clone().unwrap();
    assert_eq!(starting.len(), 12);
    for asset in joined.creator_portfolio.iter().chain(joined.opponent_portfolio()) {
        assert_eq!(asset.price, starting[&asset.symbol]);
    }
    assert_eq!(
        manager.get_battle(joined.id).await.unwrap().derived_status,
        BattleStatus::Active
    );

    // nothing is due yet
    assert!(manager.settle_due(None).await.unwrap().settled.is_empty());

    // NVDA doubles for the creator: +15%
    h.prices.set_price("NVDA", dec!(1800));
    h.clock.advance(Duration::hours(24));

    let report = manager.settle_due(Some("alice")).await.unwrap();
    assert_eq!(report.settled, vec![joined.id]);
    assert_eq!(report.viewer_updates.len(), 1);

    let settled = manager.get_battle(joined.id).await.unwrap().battle;
    let result = settled.result.clone().unwrap();
    assert_eq!(result.creator_return, dec!(15));
    assert_eq!(result.opponent_return, dec!(0));
    assert_eq!(result.margin, dec!(15));
    assert_eq!(result.winner.as_deref(), Some("alice"));
    assert_eq!(result.xp_for("alice"), 200);
    assert_eq!(result.xp_for("bob"), 25);
    assert!(settled.ending_prices.is_some());
    assert!(settled.completed_at.is_some());

    // second pass is a no-op
    h.prices.set_price("NVDA", dec!(1));
    h.clock.advance(Duration::minutes(1));
    let writes = h.store.battle_writes();
    assert!(manager.settle_due(Some("alice")).await.unwrap().settled.is_empty());
    assert_eq!(h.store.battle_writes(), writes);
    assert_eq!(manager.get_battle(joined.id).await.unwrap().battle, settled);

    let (alice, _) = manager.reconcile_profile("alice").await.unwrap();
    assert_eq!(alice.xp, 200);
    assert_eq!(alice.wins, 1);

    // bob was offline; he is credited when his profile is next loaded
    let (bob, updates) = manager.reconcile_profile("bob").await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(bob.xp, 25);
    assert_eq!(bob.losses, 1);
    assert_eq!(bob.rank(), Rank::Beginner);
}

#[tokio::test]
async fn type_mismatch_leaves_battle_waiting() {
    let h = Harness::new();
    let manager = h.manager();

    let created = manager.create_battle("alice", &crypto(), "Coins").await.unwrap();
    let err = manager
        .join_battle(&created.challenge_code, "bob", &creator_stocks())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Core(CoreError::TypeMismatch { .. })
    ));

    let view = manager.get_battle(created.id).await.unwrap();
    assert_eq!(view.derived_status, BattleStatus::Waiting);
    assert!(view.battle.opponent.is_none());
}

#[tokio::test]
async fn join_errors() {
    let h = Harness::new();
    let manager = h.manager();
    let created = manager.create_battle("alice", &creator_stocks(), "Tech").await.unwrap();

    assert!(matches!(
        manager.join_battle("   ", "bob", &opponent_stocks()).await,
        Err(EngineError::Core(CoreError::MissingCode))
    ));
    assert!(matches!(
        manager.join_battle("ZZZZZZ", "bob", &opponent_stocks()).await,
        Err(EngineError::Core(CoreError::NotFound(_)))
    ));
    assert!(matches!(
        manager.join_battle(&created.challenge_code, "alice", &opponent_stocks()).await,
        Err(EngineError::Core(CoreError::SelfJoin))
    ));

    manager
        .join_battle(&created.challenge_code, "bob", &opponent_stocks())
        .await
        .unwrap();
    // the code no longer matches a waiting battle
    assert!(matches!(
        manager.join_battle(&created.challenge_code, "carol", &opponent_stocks()).await,
        Err(EngineError::Core(CoreError::NotFound(_)))
    ));
}

#[tokio::test]
async fn invalid_create_mutates_nothing() {
    let h = Harness::new();
    let manager = h.manager();

    let mut short = creator_stocks();
    short.pop();
    let err = manager.create_battle("alice", &short, "Tech").await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::Portfolio(_))));

    let err = manager.create_battle("alice", &creator_stocks(), "  ").await.unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::MissingName)));

    assert!(h.store.load_all().await.unwrap().is_empty());
    assert_eq!(h.store.battle_writes(), 0);
}

#[tokio::test]
async fn concurrent_settlement_awards_xp_once() {
    let h = Harness::new();
    let first = Arc::new(h.manager());
    let second = Arc::new(h.manager());

    let created = first.create_battle("alice", &creator_stocks(), "Tech").await.unwrap();
    second
        .join_battle(&created.challenge_code, "bob", &opponent_stocks())
        .await
        .unwrap();
    h.prices.set_price("AAPL", dec!(209));
    h.clock.advance(Duration::hours(25));

    let (a, b) = tokio::join!(first.settle_due(Some("alice")), second.settle_due(Some("alice")));
    let settled_count = a.unwrap().settled.len() + b.unwrap().settled.len();
    assert!(settled_count >= 1);

    let (alice, updates) = first.reconcile_profile("alice").await.unwrap();
    assert!(updates.is_empty());
    assert_eq!(alice.wins, 1);

    let battle = first.get_battle(created.id).await.unwrap().battle;
    let xp = battle.result.unwrap().xp_for("alice");
    assert_eq!(alice.xp, u64::from(xp));
}

#[tokio::test]
async fn archive_moves_battle_into_history() {
    let h = Harness::new();
    let manager = h.manager();

    let created = manager.create_battle("alice", &crypto(), "Coins").await.unwrap();
    let mut opp = crypto();
    opp.reverse();
    manager.join_battle(&created.challenge_code, "bob", &opp).await.unwrap();

    assert!(matches!(
        manager.archive_battle(created.id, "bob").await,
        Err(EngineError::NotSettled(_))
    ));

    h.clock.advance(Duration::hours(24));
    manager.settle_due(None).await.unwrap();

    assert!(matches!(
        manager.archive_battle(created.id, "carol").await,
        Err(EngineError::NotParticipant { .. })
    ));

    let archived = manager.archive_battle(created.id, "bob").await.unwrap();
    assert!(archived.archived_at.is_some());
    assert!(manager.battles_for("bob").await.unwrap().is_empty());
    assert!(matches!(
        manager.get_battle(created.id).await,
        Err(EngineError::BattleNotFound(_))
    ));

    let history = manager.load_history("alice").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, created.id);

    // identical portfolios: a draw, credited from history
    let (alice, _) = manager.reconcile_profile("alice").await.unwrap();
    assert_eq!(alice.draws, 1);
    assert_eq!(alice.xp, 25);
}

#[tokio::test]
async fn stale_challenges_are_pruned() {
    let h = Harness::new();
    let manager = h.manager();

    let stale = manager.create_battle("alice", &crypto(), "Old").await.unwrap();
    h.clock.advance(Duration::hours(20));
    let fresh = manager.create_battle("carol", &crypto(), "New").await.unwrap();
    h.clock.advance(Duration::hours(5));

    assert_eq!(manager.prune_stale_challenges().await.unwrap(), 1);
    let remaining: Vec<_> = h.store.load_all().await.unwrap().into_iter().map(|b| b.id).collect();
    assert_eq!(remaining, vec![fresh.id]);
    assert!(manager.get_battle(stale.id).await.is_err());
}

#[tokio::test]
async fn battle_prices_reports_live_standings() {
    let h = Harness::new();
    let manager = h.manager();

    let created = manager.create_battle("alice", &creator_stocks(), "Tech").await.unwrap();
    let waiting = manager.battle_prices(created.id).await.unwrap();
    assert_eq!(waiting.status, BattleStatus::Waiting);
    assert!(waiting.standings.is_none());

    manager
        .join_battle(&created.challenge_code, "bob", &opponent_stocks())
        .await
        .unwrap();
    h.prices.set_price("PG", dec!(176));
    h.clock.advance(Duration::hours(2));

    let live = manager.battle_prices(created.id).await.unwrap();
    assert!(live.live);
    assert_eq!(live.prices["PG"], dec!(176));
    let standings = live.standings.unwrap();
    // PG +10% on a 15% weight
    assert_eq!(standings.opponent_return, dec!(1.5));
    assert_eq!(standings.creator_return, dec!(0));
    assert_eq!(standings.leader.as_deref(), Some("bob"));
}

#[tokio::test]
async fn failed_write_surfaces_and_keeps_state() {
    let h = Harness::new();
    let manager = h.manager();
    h.store.fail_writes(true);
    let err = manager.create_battle("alice", &crypto(), "Coins").await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    h.store.fail_writes(false);
    assert!(h.store.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn extreme_client_prices_cannot_break_settlement() {
    // no live quotes at all, as when no Finnhub key is configured
    let h = Harness::with_source(StaticPriceSource::new());
    let manager = h.manager();

    let mut inflated = creator_stocks();
    for a in &mut inflated {
        a.price = dec!(1000000000000000000000000);
    }
    let created = manager.create_battle("alice", &inflated, "Moon").await.unwrap();
    assert!(created.creator_portfolio.iter().all(|a| a.price == dec!(100)));

    let mut fair = opponent_stocks();
    for a in &mut fair {
        a.price = dec!(100);
    }
    manager.join_battle(&created.challenge_code, "bob", &fair).await.unwrap();
    h.clock.advance(Duration::hours(25));

    let report = manager.settle_due(None).await.unwrap();
    assert_eq!(report.settled, vec![created.id]);
    let result = manager.get_battle(created.id).await.unwrap().battle.result.unwrap();
    assert_eq!(result.winner, None);
    assert_eq!(result.margin, dec!(0));

    let prices = manager.battle_prices(created.id).await.unwrap();
    assert!(prices.standings.is_some());
}

#[tokio::test]
async fn failed_join_write_leaves_battle_waiting() {
    let h = Harness::new();
    let manager = h.manager();
    let created = manager.create_battle("alice", &creator_stocks(), "Tech").await.unwrap();

    h.store.fail_battle_writes(true);
    let err = manager
        .join_battle(&created.challenge_code, "bob", &opponent_stocks())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    h.store.fail_battle_writes(false);

    let view = manager.get_battle(created.id).await.unwrap();
    assert_eq!(view.derived_status, BattleStatus::Waiting);
    assert!(view.battle.opponent.is_none());
    assert!(view.battle.starting_prices.is_none());

    // the code still works once storage recovers
    manager
        .join_battle(&created.challenge_code, "bob", &opponent_stocks())
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_settlement_write_awards_nothing_then_retries_once() {
    let h = Harness::new();
    let manager = h.manager();
    let created = manager.create_battle("alice", &creator_stocks(), "Tech").await.unwrap();
    manager
        .join_battle(&created.challenge_code, "bob", &opponent_stocks())
        .await
        .unwrap();
    h.prices.set_price("NVDA", dec!(1800));
    h.clock.advance(Duration::hours(25));

    h.store.fail_battle_writes(true);
    assert!(matches!(
        manager.settle_due(Some("alice")).await,
        Err(EngineError::Store(_))
    ));
    h.store.fail_battle_writes(false);

    assert!(manager.get_battle(created.id).await.unwrap().battle.result.is_none());
    assert!(h.store.load("alice").await.unwrap().is_none());

    let report = manager.settle_due(Some("alice")).await.unwrap();
    assert_eq!(report.settled, vec![created.id]);
    assert_eq!(report.viewer_updates.len(), 1);

    let again = manager.settle_due(Some("alice")).await.unwrap();
    assert!(again.settled.is_empty());
    assert!(again.viewer_updates.is_empty());

    let alice = h.store.load("alice").await.unwrap().unwrap();
    assert_eq!(alice.wins, 1);
    assert_eq!(alice.xp, 200);
}

#[tokio::test]
async fn failed_archive_is_undone_and_retry_archives_once() {
    let h = Harness::new();
    let manager = h.manager();
    let created = manager.create_battle("alice", &crypto(), "Coins").await.unwrap();
    manager.join_battle(&created.challenge_code, "bob", &crypto()).await.unwrap();
    h.clock.advance(Duration::hours(24));
    manager.settle_due(None).await.unwrap();

    h.store.fail_battle_writes(true);
    assert!(matches!(
        manager.archive_battle(created.id, "alice").await,
        Err(EngineError::Store(_))
    ));
    h.store.fail_battle_writes(false);

    // neither half of the archive is visible
    assert!(h.store.load_history("alice").await.unwrap().is_empty());
    assert_eq!(manager.battles_for("alice").await.unwrap().len(), 1);

    manager.archive_battle(created.id, "alice").await.unwrap();
    assert_eq!(h.store.load_history("alice").await.unwrap().len(), 1);
    assert!(h.store.load_all().await.unwrap().is_empty());
    assert!(matches!(
        manager.archive_battle(created.id, "alice").await,
        Err(EngineError::BattleNotFound(_))
    ));
}
