//! Identity authority: the system of record for issued session tokens.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::redis::{PoolError, RedisPool};

/// Authoritative record stored for an issued session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Redis error: {0}")]
    Redis(#[from] PoolError),

    #[error("Malformed session record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Looks up session tokens against the identity backend.
#[async_trait]
pub trait IdentityAuthority: Send + Sync {
    /// `Ok(None)` when the token was never issued (or has been revoked).
    async fn verify(&self, token: &str) -> Result<Option<SessionRecord>, IdentityError>;
}

/// Tokens stored as JSON strings under `{prefix}:{token}`.
pub struct RedisIdentityAuthority {
    pool: Arc<RedisPool>,
    prefix: String,
}

impl RedisIdentityAuthority {
    pub fn new(pool: Arc<RedisPool>, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    fn token_key(&self, token: &str) -> String {
        format!("{}:{}", self.prefix, token)
    }
}

#[async_trait]
impl IdentityAuthority for RedisIdentityAuthority {
    async fn verify(&self, token: &str) -> Result<Option<SessionRecord>, IdentityError> {
        let key = self.token_key(token);
        let raw: Option<String> = self
            .pool
            .execute(|mut conn| async move {
                redis::cmd("GET").arg(&key).query_async(&mut conn).await
            })
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

/// In-process authority for development and tests.
#[derive(Default)]
pub struct MemoryIdentityAuthority {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryIdentityAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record under `key`. The key is what clients present; the
    /// record's own token is what the authority vouches for.
    pub fn insert(&self, key: impl Into<String>, record: SessionRecord) {
        self.records.write().insert(key.into(), record);
    }

    pub fn issue(&self, token: impl Into<String>, role: impl Into<String>) {
        let token = token.into();
        self.insert(
            token.clone(),
            SessionRecord {
                token,
                role: role.into(),
            },
        );
    }
}

#[async_trait]
impl IdentityAuthority for MemoryIdentityAuthority {
    async fn verify(&self, token: &str) -> Result<Option<SessionRecord>, IdentityError> {
        Ok(self.records.read().get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    #[tokio::test]
    async fn test_memory_authority_lookup() {
        let authority = MemoryIdentityAuthority::new();
        authority.issue("tok-1", "user");

        let record = authority.verify("tok-1").await.unwrap().unwrap();
        assert_eq!(record.token, "tok-1");
        assert_eq!(record.role, "user");

        assert!(authority.verify("tok-2").await.unwrap().is_none());
    }

    #[test]
    fn test_record_role_is_optional() {
        let record: SessionRecord = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(record.token, "abc");
        assert_eq!(record.role, "");
    }

    #[test]
    fn test_redis_token_key() {
        let pool = Arc::new(RedisPool::new(RedisConfig::default()).unwrap());
        let authority = RedisIdentityAuthority::new(pool, "tokens");
        assert_eq!(authority.token_key("abc"), "tokens:abc");
    }
}
