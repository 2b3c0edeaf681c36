//! Battle lifecycle endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use tradeseven_core::Battle;
use tradeseven_engine::BattleView;

use super::parse_battle_id;
use crate::dto::{
    to_allocations, ArchiveRequest, BattleDetailResponse, CreateBattleRequest, JoinBattleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_battle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBattleRequest>,
) -> ApiResult<(StatusCode, Json<BattleView>)> {
    let battle = state
        .manager
        .create_battle(&req.username, &to_allocations(&req.allocations), &req.portfolio_name)
        .await?;
    Ok((StatusCode::CREATED, Json(BattleView::new(battle, state.manager.now()))))
}

pub async fn join_battle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinBattleRequest>,
) -> ApiResult<Json<BattleView>> {
    let battle = state
        .manager
        .join_battle(&req.code, &req.username, &to_allocations(&req.allocations))
        .await?;
    Ok(Json(BattleView::new(battle, state.manager.now())))
}

pub async fn get_battle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<BattleDetailResponse>> {
    let id = parse_battle_id(&id)?;
    let view = state.manager.get_battle(id).await?;
    let prices = state.manager.battle_prices(id).await?;
    Ok(Json(BattleDetailResponse::new(view, prices)))
}

pub async fn archive_battle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ArchiveRequest>,
) -> ApiResult<Json<Battle>> {
    let id = parse_battle_id(&id)?;
    let archived = state.manager.archive_battle(id, &req.username).await?;
    Ok(Json(archived))
}
