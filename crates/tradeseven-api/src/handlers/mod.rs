//! Request handlers, one module per resource.

pub mod battles;
pub mod health;
pub mod market;
pub mod users;

use tradeseven_core::BattleId;

use crate::error::{ApiError, ApiResult};

pub(crate) fn parse_battle_id(raw: &str) -> ApiResult<BattleId> {
    BattleId::parse(raw).ok_or_else(|| ApiError::InvalidParameter(format!("battle id {raw}")))
}
