//! Backend trait for push subscription storage.
//!
//! Records are keyed by user identity. A put replaces any previous record
//! for the same user; nothing in the relay deletes records.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::redis::PoolError;

/// Errors that can occur during subscription store operations.
#[derive(Debug, Error)]
pub enum SubscriptionStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] PoolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keys a push service needs to encrypt a message for one browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A browser push subscription, as produced by `PushManager.subscribe()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// One-pass stream over every stored `(user_id, record)` pair.
pub type SubscriptionStream<'a> =
    BoxStream<'a, Result<(String, SubscriptionRecord), SubscriptionStoreError>>;

/// Durable store for push subscription records.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create or overwrite the record for `user_id`.
    async fn put(&self, user_id: &str, record: &SubscriptionRecord)
        -> Result<(), SubscriptionStoreError>;

    /// Look up the record for `user_id`. `Ok(None)` if the user never subscribed.
    async fn get(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, SubscriptionStoreError>;

    /// Iterate every record once. Calling again starts a fresh pass.
    fn iter_all(&self) -> SubscriptionStream<'_>;

    /// Backend identifier for health output
    fn backend_type(&self) -> &'static str;
}
