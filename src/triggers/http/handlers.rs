//! HTTP notification handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::notification::NotificationTarget;
use crate::server::AppState;

use super::models::{
    BroadcastRequest, MessageResponse, NotificationRequest, PushSubscriptionQuery,
    PushSubscriptionRequest,
};

const ACCEPTED: &str = "notification request accepted";

/// Bodies are parsed by hand so a wrong or missing content type is not an error.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        AppError::InvalidJson
    })
}

/// POST /send - targeted notifications, one per entry
#[tracing::instrument(name = "http.send", skip_all)]
pub async fn send_notifications(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let requests: Vec<NotificationRequest> = parse_body(&body)?;
    let notifications = requests
        .into_iter()
        .map(NotificationRequest::validate)
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(count = notifications.len(), "Accepted targeted notifications");

    for (user_id, payload) in notifications {
        state
            .dispatcher
            .dispatch(payload, NotificationTarget::User(user_id));
    }

    Ok(Json(MessageResponse::new(ACCEPTED)))
}

/// POST /broadcast - one notification to everyone on both transports
#[tracing::instrument(name = "http.broadcast", skip_all)]
pub async fn broadcast_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let payload = parse_body::<BroadcastRequest>(&body)?.validate()?;

    tracing::info!("Accepted broadcast notification");
    state.dispatcher.dispatch(payload, NotificationTarget::All);

    Ok(Json(MessageResponse::new(ACCEPTED)))
}

/// POST /push-subscription?token= - store a browser's push subscription
#[tracing::instrument(name = "http.push_subscription", skip_all)]
pub async fn add_push_subscription(
    State(state): State<AppState>,
    Query(query): Query<PushSubscriptionQuery>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let record = parse_body::<PushSubscriptionRequest>(&body)?.validate()?;

    let user_id = query
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Validation("missing token in url query".to_string()))?;

    state.subscriptions.put(&user_id, &record).await?;
    tracing::info!(user_id = %user_id, "Push subscription added");

    Ok(Json(MessageResponse::new("subscription added")))
}
