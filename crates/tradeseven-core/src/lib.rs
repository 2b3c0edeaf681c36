//! TradeSeven domain layer.
//!
//! Pure types and rules for portfolio duels: two players each pick a
//! weighted portfolio over a $1,000,000 notional, the prices are locked when
//! the second player joins, and after the battle window closes the side with
//! the higher percentage return wins XP.
//!
//! Nothing in this crate does I/O. Price feeds and persistence live in
//! `tradeseven-market` and `tradeseven-store`; orchestration lives in
//! `tradeseven-engine`.

pub mod asset;
pub mod battle;
pub mod code;
pub mod error;
pub mod portfolio;
pub mod profile;
pub mod scoring;
pub mod settlement;
pub mod status;

pub use asset::{unique_assets, AssetClass, PortfolioAsset, PriceMap};
pub use battle::{Battle, BattleId, BattleResult, BattleStatus};
pub use code::{generate_challenge_code, normalize_code};
pub use error::{CoreError, CoreResult, PortfolioError};
pub use portfolio::{build_portfolio, is_portfolio_valid, portfolio_class, validate_allocations, Allocation};
pub use profile::{BattleOutcome, Rank, StatsUpdate, UserProfile};
pub use scoring::{calculate_portfolio_return, calculate_xp, determine_outcome, portfolio_return, Outcome};
pub use settlement::{due_for_settlement, live_standings, merge_settlements, prune_stale_waiting, settle_battle, Standings};
pub use status::{current_day, derive_status, format_time_remaining, needs_settlement, remaining_time};
