//! TradeSeven REST API
//!
//! ```text
//! /api/v1/
//! ├── /health                      - liveness
//! ├── /users                       - login, profile, battles, history
//! ├── /market/{stocks|crypto}      - catalog with cached quotes
//! └── /battles                     - create, join, view, archive
//! ```
//!
//! There is no authentication; the username in the request names the
//! player.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

/// API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub enable_cors: bool,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    pub enable_tracing: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            enable_tracing: true,
        }
    }
}

/// Create the main API router with all middleware
pub fn create_router(state: Arc<AppState>, config: ApiConfig) -> Router {
    let mut router = Router::new()
        .nest("/api/v1", routes::api_v1_routes())
        .route("/health", axum::routing::get(handlers::health::health_check))
        .with_state(state);

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ));
    }

    if config.enable_cors {
        let cors = if config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::permissive()
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        };
        router = router.layer(cors);
    }

    router
}

/// Router without middleware, for tests.
pub fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_v1_routes())
        .with_state(state)
}
