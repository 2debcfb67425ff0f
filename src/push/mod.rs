//! Web Push delivery for users without a live connection.

mod vapid;

use async_trait::async_trait;
use thiserror::Error;

use crate::subscription::SubscriptionRecord;

pub use vapid::WebPushSender;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid VAPID key: {0}")]
    InvalidKey(web_push::WebPushError),

    #[error("push delivery failed: {0}")]
    Delivery(#[from] web_push::WebPushError),
}

/// Sends one encrypted payload to one subscription. A single attempt, no retry.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, payload: &[u8], record: &SubscriptionRecord) -> Result<(), PushError>;
}
