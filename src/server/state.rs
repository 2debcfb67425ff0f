use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use crate::auth::{
    IdentityAuthority, MemoryIdentityAuthority, RedisIdentityAuthority, SessionKey,
    SessionResolver,
};
use crate::config::{IdentityConfig, Settings};
use crate::connection_manager::ConnectionRegistry;
use crate::notification::{NotificationDispatcher, PushAssets};
use crate::push::{PushSender, WebPushSender};
use crate::redis::RedisPool;
use crate::subscription::{create_subscription_store, SubscriptionStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub session_resolver: Arc<SessionResolver>,
    pub registry: Arc<ConnectionRegistry>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire every component from configuration.
    ///
    /// Fails if Redis is unreachable, the session key cannot be derived, or
    /// the VAPID key is invalid.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let needs_redis =
            settings.identity.backend != "memory" || settings.subscriptions.backend != "memory";

        let redis_pool = if needs_redis {
            let pool = Arc::new(
                RedisPool::new(settings.redis.clone()).context("Invalid Redis configuration")?,
            );
            pool.ping()
                .await
                .with_context(|| format!("Redis unreachable at {}", pool.url()))?;
            tracing::info!(url = %pool.url(), "Redis connection verified");
            Some(pool)
        } else {
            None
        };

        let session = settings.session.clone();
        let key = tokio::task::spawn_blocking(move || {
            SessionKey::derive(session.secret_key.as_bytes(), session.salt.as_bytes())
        })
        .await
        .context("Session key derivation task failed")?
        .context("Failed to derive session key")?;

        let authority = create_identity_authority(&settings.identity, redis_pool.clone());
        let subscriptions = create_subscription_store(&settings.subscriptions, redis_pool);
        let push: Arc<dyn PushSender> =
            Arc::new(WebPushSender::new(&settings.push).context("Invalid VAPID private key")?);

        Ok(Self::from_parts(
            settings,
            SessionResolver::new(key, authority),
            subscriptions,
            push,
        ))
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        settings: Settings,
        session_resolver: SessionResolver,
        subscriptions: Arc<dyn SubscriptionStore>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            registry.clone(),
            subscriptions.clone(),
            push,
            PushAssets::from_config(&settings.push),
        ));

        Self {
            settings: Arc::new(settings),
            session_resolver: Arc::new(session_resolver),
            registry,
            subscriptions,
            dispatcher,
            start_time: Instant::now(),
        }
    }
}

fn create_identity_authority(
    config: &IdentityConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn IdentityAuthority> {
    match (config.backend.as_str(), redis_pool) {
        ("memory", _) | (_, None) => {
            tracing::warn!(
                backend = "memory",
                "Using in-memory identity authority; sessions resolve only for tokens issued in-process"
            );
            Arc::new(MemoryIdentityAuthority::new())
        }
        (_, Some(pool)) => {
            tracing::info!(
                backend = "redis",
                prefix = %config.key_prefix,
                "Creating Redis identity authority"
            );
            Arc::new(RedisIdentityAuthority::new(pool, config.key_prefix.clone()))
        }
    }
}
