use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::notification::NotificationPayload;
use crate::subscription::{SubscriptionKeys, SubscriptionRecord};

/// One entry of a `POST /send` body.
///
/// Fields are optional at the serde layer so a missing field yields the
/// relay's own validation message instead of a generic parse error.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationRequest {
    pub user: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// Body of `POST /broadcast`
#[derive(Debug, Default, Deserialize)]
pub struct BroadcastRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// Body of `POST /push-subscription`, as produced by `PushSubscription.toJSON()`
#[derive(Debug, Default, Deserialize)]
pub struct PushSubscriptionRequest {
    pub endpoint: Option<String>,
    #[serde(default)]
    pub keys: PushSubscriptionKeys,
}

#[derive(Debug, Default, Deserialize)]
pub struct PushSubscriptionKeys {
    pub auth: Option<String>,
    pub p256dh: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PushSubscriptionQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A field that must be present; empty strings fail with `empty` if given, else `missing`
fn required(value: Option<String>, missing: &str, empty: Option<&str>) -> Result<String> {
    match value {
        None => Err(AppError::Validation(missing.to_string())),
        Some(v) if v.is_empty() => Err(AppError::Validation(
            empty.unwrap_or(missing).to_string(),
        )),
        Some(v) => Ok(v),
    }
}

fn content(
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
) -> Result<NotificationPayload> {
    let title = required(title, "title is required", Some("title cannot be empty"))?;
    let description = required(
        description,
        "description is required",
        Some("description cannot be empty"),
    )?;
    let link = required(link, "link is required", Some("link cannot be empty"))?;
    Ok(NotificationPayload::new(title, description, link))
}

impl NotificationRequest {
    /// Check every field, returning the first failure.
    pub fn validate(self) -> Result<(String, NotificationPayload)> {
        let user = required(self.user, "users array is required", Some("user cannot be empty"))?;
        let payload = content(self.title, self.description, self.link)?;
        Ok((user, payload))
    }
}

impl BroadcastRequest {
    pub fn validate(self) -> Result<NotificationPayload> {
        content(self.title, self.description, self.link)
    }
}

impl PushSubscriptionRequest {
    pub fn validate(self) -> Result<SubscriptionRecord> {
        let endpoint = required(self.endpoint, "endpoint URL is required", None)?;
        let auth = required(self.keys.auth, "auth key is required", None)?;
        let p256dh = required(self.keys.p256dh, "p256dh key is required", None)?;
        Ok(SubscriptionRecord {
            endpoint,
            keys: SubscriptionKeys { p256dh, auth },
        })
    }
}
