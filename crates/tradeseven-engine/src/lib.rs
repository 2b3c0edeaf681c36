//! TradeSeven Engine - battle lifecycle orchestration
//!
//! [`BattleManager`] ties the pure domain rules of `tradeseven-core` to a
//! price source and the stores:
//!
//! - **create**: validate a portfolio and open a challenge with a fresh code
//! - **join**: lock starting prices for both portfolios and start the clock
//! - **settle**: price expired battles, write results once, credit XP
//! - **archive**: move a settled battle into the participant's history
//! - **reconcile**: credit a profile for any settled battle it missed
//! - **prune**: drop challenges nobody joined in time
//!
//! [`spawn_pollers`] runs settlement, market refresh and pruning in the
//! background.

pub mod clock;
pub mod error;
pub mod manager;
pub mod poller;
pub mod settlement;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use manager::{BattleManager, BattlePrices, BattleView, EngineConfig, SettlementReport};
pub use poller::{spawn_pollers, PollerConfig};
pub use settlement::run_settlement_pass;
