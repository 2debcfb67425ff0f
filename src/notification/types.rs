use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PushConfig;

/// Notification content shared by every recipient of a dispatch.
///
/// Serialized as the live wire format: `{"title","description","link"}`
/// with empty fields omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "link_is_empty")]
    pub link: Option<String>,
}

fn link_is_empty(link: &Option<String>) -> bool {
    link.as_deref().map_or(true, str::is_empty)
}

impl NotificationPayload {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        let link = link.into();
        Self {
            title: title.into(),
            description: description.into(),
            link: (!link.is_empty()).then_some(link),
        }
    }
}

/// Who a dispatch is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    /// One user identity, over both transports
    User(String),
    /// Every live connection and every stored subscription
    All,
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationTarget::User(user_id) => write!(f, "user:{}", user_id),
            NotificationTarget::All => f.write_str("all"),
        }
    }
}

/// Static asset paths a service worker shows alongside a push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAssets {
    pub icon: String,
    pub badge: String,
    pub image: String,
}

impl PushAssets {
    pub fn from_config(config: &PushConfig) -> Self {
        Self {
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            image: config.image.clone(),
        }
    }
}

impl Default for PushAssets {
    fn default() -> Self {
        Self {
            icon: "/android-192x192.png".to_string(),
            badge: "/logo.png".to_string(),
            image: "/logo.png".to_string(),
        }
    }
}

/// Body of an encrypted Web Push message, as read by the service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotificationEvent {
    pub body: String,
    pub icon: String,
    pub image: String,
    pub badge: String,
    pub url: String,
    pub title: String,
}

impl PushNotificationEvent {
    pub fn new(payload: &NotificationPayload, assets: &PushAssets) -> Self {
        Self {
            body: payload.description.clone(),
            icon: assets.icon.clone(),
            image: assets.image.clone(),
            badge: assets.badge.clone(),
            url: payload.link.clone().unwrap_or_default(),
            title: payload.title.clone(),
        }
    }
}
