//! In-memory subscription store for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;

use super::backend::{
    SubscriptionRecord, SubscriptionStore, SubscriptionStoreError, SubscriptionStream,
};

#[derive(Default)]
pub struct MemorySubscriptionStore {
    records: RwLock<HashMap<String, SubscriptionRecord>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn put(
        &self,
        user_id: &str,
        record: &SubscriptionRecord,
    ) -> Result<(), SubscriptionStoreError> {
        self.records
            .write()
            .insert(user_id.to_string(), record.clone());
        Ok(())
    }

    async fn get(
        &self,
        user_id: &str,
    ) -> Result<Option<SubscriptionRecord>, SubscriptionStoreError> {
        Ok(self.records.read().get(user_id).cloned())
    }

    fn iter_all(&self) -> SubscriptionStream<'_> {
        // Copy out so writers are never blocked by a slow consumer
        let entries: Vec<_> = self
            .records
            .read()
            .iter()
            .map(|(user, record)| Ok((user.clone(), record.clone())))
            .collect();
        stream::iter(entries).boxed()
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionKeys;
    use futures::TryStreamExt;

    fn record(endpoint: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            endpoint: endpoint.to_string(),
            keys: SubscriptionKeys {
                p256dh: "p256dh-key".to_string(),
                auth: "auth-key".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemorySubscriptionStore::new();
        assert!(store.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemorySubscriptionStore::new();
        store.put("alice", &record("https://push/1")).await.unwrap();
        store.put("alice", &record("https://push/2")).await.unwrap();

        let found = store.get("alice").await.unwrap().unwrap();
        assert_eq!(found.endpoint, "https://push/2");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_iter_all_is_restartable() {
        let store = MemorySubscriptionStore::new();
        store.put("alice", &record("https://push/a")).await.unwrap();
        store.put("bob", &record("https://push/b")).await.unwrap();

        let mut first: Vec<_> = store.iter_all().try_collect().await.unwrap();
        first.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].0, "alice");
        assert_eq!(first[1].1.endpoint, "https://push/b");

        let second: Vec<_> = store.iter_all().try_collect().await.unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_writes_during_iteration() {
        let store = MemorySubscriptionStore::new();
        store.put("alice", &record("https://push/a")).await.unwrap();

        let mut stream = store.iter_all();
        store.put("bob", &record("https://push/b")).await.unwrap();

        let mut seen = 0;
        while let Some(entry) = stream.next().await {
            entry.unwrap();
            seen += 1;
        }
        assert_eq!(seen, 1);
        assert_eq!(store.len(), 2);
    }
}
