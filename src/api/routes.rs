use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::triggers::{add_push_subscription, broadcast_notification, send_notifications};

use super::connection::connection_count;

/// Endpoints guarded by the admin API key
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/connections", get(connection_count))
        .route("/push-subscription", post(add_push_subscription))
        // Notification endpoints
        .route("/send", post(send_notifications))
        .route("/broadcast", post(broadcast_notification))
}
