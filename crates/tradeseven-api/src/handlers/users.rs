//! Player profiles, their battles and history.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::dto::{BattleListResponse, HistoryResponse, LoginRequest, ProfileResponse};
use crate::error::ApiResult;
use crate::state::AppState;

/// Load or create a profile.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state.manager.ensure_profile(&req.username).await?;
    Ok(Json(ProfileResponse::new(profile, Vec::new())))
}

/// Settle anything due with this user as the viewer, then return the
/// reconciled profile. Unknown users are a 404; profiles are only created
/// by login.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<Json<ProfileResponse>> {
    state.manager.profile(&username).await?;
    let report = state.manager.settle_due(Some(&username)).await?;
    let (profile, late) = state.manager.reconcile_profile(&username).await?;
    let mut updates = report.viewer_updates;
    updates.extend(late);
    Ok(Json(ProfileResponse::new(profile, updates)))
}

pub async fn list_battles(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<Json<BattleListResponse>> {
    let battles = state.manager.battles_for(&username).await?;
    Ok(Json(BattleListResponse { battles }))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let battles = state.manager.load_history(&username).await?;
    Ok(Json(HistoryResponse { battles }))
}
