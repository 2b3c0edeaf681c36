//! Route table for `/api/v1`.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Users
        .route("/users", post(handlers::users::login))
        .route("/users/:username", get(handlers::users::get_profile))
        .route("/users/:username/battles", get(handlers::users::list_battles))
        .route("/users/:username/history", get(handlers::users::history))
        // Market data
        .route("/market/:class", get(handlers::market::list_assets))
        // Battles
        .route("/battles", post(handlers::battles::create_battle))
        .route("/battles/join", post(handlers::battles::join_battle))
        .route("/battles/:id", get(handlers::battles::get_battle))
        .route("/battles/:id/archive", post(handlers::battles::archive_battle))
}
