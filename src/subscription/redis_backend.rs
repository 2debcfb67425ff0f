//! Redis-backed subscription store.
//!
//! All records live in one hash: field = user id, value = JSON record.
//! Full iteration walks the hash with HSCAN so large sets are never
//! loaded into memory at once.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use crate::redis::RedisPool;

use super::backend::{
    SubscriptionRecord, SubscriptionStore, SubscriptionStoreError, SubscriptionStream,
};

/// Fields requested per HSCAN round trip
const SCAN_COUNT: usize = 100;

pub struct RedisSubscriptionStore {
    pool: Arc<RedisPool>,
    hash_key: String,
}

impl RedisSubscriptionStore {
    pub fn new(pool: Arc<RedisPool>, hash_key: impl Into<String>) -> Self {
        Self {
            pool,
            hash_key: hash_key.into(),
        }
    }

    async fn scan_page(
        &self,
        cursor: u64,
    ) -> Result<(u64, HashMap<String, String>), SubscriptionStoreError> {
        let key = self.hash_key.clone();
        let page = self
            .pool
            .execute(|mut conn| async move {
                redis::cmd("HSCAN")
                    .arg(&key)
                    .arg(cursor)
                    .arg("COUNT")
                    .arg(SCAN_COUNT)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(page)
    }
}

#[async_trait]
impl SubscriptionStore for RedisSubscriptionStore {
    async fn put(
        &self,
        user_id: &str,
        record: &SubscriptionRecord,
    ) -> Result<(), SubscriptionStoreError> {
        let value = serde_json::to_string(record)?;
        let key = self.hash_key.clone();
        let field = user_id.to_string();

        self.pool
            .execute(|mut conn| async move {
                let _: i64 = redis::cmd("HSET")
                    .arg(&key)
                    .arg(&field)
                    .arg(&value)
                    .query_async(&mut conn)
                    .await?;
                Ok(())
            })
            .await?;

        tracing::debug!(user_id = %user_id, hash = %self.hash_key, "Stored push subscription");
        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
    ) -> Result<Option<SubscriptionRecord>, SubscriptionStoreError> {
        let key = self.hash_key.clone();
        let field = user_id.to_string();

        let raw: Option<String> = self
            .pool
            .execute(|mut conn| async move {
                redis::cmd("HGET").arg(&key).arg(&field).query_async(&mut conn).await
            })
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn iter_all(&self) -> SubscriptionStream<'_> {
        async_stream::stream! {
            let mut cursor = 0u64;
            loop {
                let (next, entries) = match self.scan_page(cursor).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                for (user_id, json) in entries {
                    match serde_json::from_str::<SubscriptionRecord>(&json) {
                        Ok(record) => yield Ok((user_id, record)),
                        Err(e) => {
                            // One corrupt entry should not end the pass
                            tracing::warn!(
                                user_id = %user_id,
                                error = %e,
                                "Skipping unreadable subscription record"
                            );
                        }
                    }
                }

                if next == 0 {
                    break;
                }
                cursor = next;
            }
        }
        .boxed()
    }

    fn backend_type(&self) -> &'static str {
        "redis"
    }
}
