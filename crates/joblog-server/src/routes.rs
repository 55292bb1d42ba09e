//! Route configuration for the log API.

use std::sync::Arc;

use axum::routing::{get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::{get_log, health_check, list_logs, poll_log};
use crate::state::AppState;

/// Create the log API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(state.config());
    let prefix = state.config().api_prefix.clone();

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/jobs/{id}/logs", get(list_logs))
        // Log names may contain slashes, hence the wildcards.
        .route("/jobs/{id}/log/{*log_name}", get(get_log))
        .route("/jobs/{id}/log-json/{*log_name}", get(poll_log));

    Router::new()
        .nest(&prefix, api_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
