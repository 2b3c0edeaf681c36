//! Application state shared across handlers.

use std::sync::Arc;

use tradeseven_engine::BattleManager;

pub struct AppState {
    pub manager: Arc<BattleManager>,
}

impl AppState {
    pub fn new(manager: Arc<BattleManager>) -> Self {
        Self { manager }
    }
}
