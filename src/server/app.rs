use axum::{middleware, routing::get, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::api::{admin_routes, health, prometheus_metrics};
use crate::websocket::ws_handler;

use super::middleware::admin_auth;
use super::AppState;

pub fn create_app(state: AppState) -> Router {
    let max_body_bytes = state.settings.server.max_body_bytes;

    Router::new()
        // Admin endpoints
        .merge(
            admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth)),
        )
        // WebSocket endpoint
        .route("/subscribe", get(ws_handler))
        // Operational endpoints
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        // Add state
        .with_state(state)
}
