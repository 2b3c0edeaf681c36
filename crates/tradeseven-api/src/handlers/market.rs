use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use tradeseven_core::AssetClass;
use tradeseven_market::MarketAsset;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Catalog assets of one class with their cached quotes.
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    Path(class): Path<String>,
) -> ApiResult<Json<Vec<MarketAsset>>> {
    let class = AssetClass::parse(&class)
        .ok_or_else(|| ApiError::InvalidParameter(format!("asset class {class}")))?;
    Ok(Json(state.manager.market(class)))
}
