//! Subscription store factory

use std::sync::Arc;

use crate::config::SubscriptionConfig;
use crate::redis::RedisPool;

use super::backend::SubscriptionStore;
use super::memory_backend::MemorySubscriptionStore;
use super::redis_backend::RedisSubscriptionStore;

/// Create a subscription store based on configuration.
///
/// - `"redis"` (default): a `RedisSubscriptionStore` if a Redis pool is provided
/// - `"memory"`: a process-local `MemorySubscriptionStore`
pub fn create_subscription_store(
    settings: &SubscriptionConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn SubscriptionStore> {
    match settings.backend.as_str() {
        "memory" => {
            tracing::info!(backend = "memory", "Creating in-memory subscription store");
            Arc::new(MemorySubscriptionStore::new())
        }
        other => {
            if other != "redis" {
                tracing::warn!(backend = %other, "Unknown subscription backend, using redis");
            }
            match redis_pool {
                Some(pool) => {
                    tracing::info!(
                        backend = "redis",
                        hash = %settings.hash_key,
                        "Creating Redis subscription store"
                    );
                    Arc::new(RedisSubscriptionStore::new(pool, settings.hash_key.clone()))
                }
                None => {
                    tracing::warn!(
                        "Redis subscription store requested but no pool provided, falling back to memory"
                    );
                    Arc::new(MemorySubscriptionStore::new())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: &str) -> SubscriptionConfig {
        SubscriptionConfig {
            backend: backend.to_string(),
            hash_key: "subscriptions".to_string(),
        }
    }

    #[test]
    fn test_memory_backend() {
        let store = create_subscription_store(&config("memory"), None);
        assert_eq!(store.backend_type(), "memory");
    }

    #[test]
    fn test_redis_without_pool_falls_back() {
        let store = create_subscription_store(&config("redis"), None);
        assert_eq!(store.backend_type(), "memory");
    }

    #[test]
    fn test_redis_with_pool() {
        let pool = RedisPool::new(crate::config::RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        })
        .unwrap();
        let store = create_subscription_store(&config("redis"), Some(Arc::new(pool)));
        assert_eq!(store.backend_type(), "redis");
    }
}
