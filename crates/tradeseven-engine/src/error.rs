use thiserror::Error;

use tradeseven_core::{BattleId, CoreError, PortfolioError};
use tradeseven_store::StoreError;

/// Errors raised by battle operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Battle not found: {0}")]
    BattleNotFound(BattleId),

    #[error("{username} is not a participant of battle {battle_id}")]
    NotParticipant { battle_id: BattleId, username: String },

    #[error("Battle {0} has not been settled yet")]
    NotSettled(BattleId),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<PortfolioError> for EngineError {
    fn from(e: PortfolioError) -> Self {
        Self::Core(CoreError::Portfolio(e))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
