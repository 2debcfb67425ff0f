//! Live connection endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct ConnectionCountResponse {
    pub connections: usize,
}

/// GET /connections - number of live WebSocket connections
pub async fn connection_count(State(state): State<AppState>) -> Json<ConnectionCountResponse> {
    Json(ConnectionCountResponse {
        connections: state.registry.count(),
    })
}
