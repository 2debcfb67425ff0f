use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub subscriptions: SubscriptionConfig,
    pub push: PushConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on accepted request bodies
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Inputs for the session credential key. The key itself is derived once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret_key: String,
    pub salt: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

/// Static shared secret guarding the admin endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// "redis" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Session tokens live under `{key_prefix}:{token}`
    #[serde(default = "default_identity_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// "redis" or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Hash holding one subscription record per user
    #[serde(default = "default_subscription_hash")]
    pub hash_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Raw base64url VAPID private key (the format most key generators emit)
    pub vapid_private_key: String,
    /// Contact for the VAPID `sub` claim
    #[serde(default = "default_subscriber")]
    pub subscriber: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_badge")]
    pub badge: String,
    #[serde(default = "default_image")]
    pub image: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Outbound frames buffered per connection before writers wait
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7924
}

fn default_max_body_bytes() -> usize {
    1 << 20
}

fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_backend() -> String {
    "redis".to_string()
}

fn default_identity_prefix() -> String {
    "tokens".to_string()
}

fn default_subscription_hash() -> String {
    "subscriptions".to_string()
}

fn default_subscriber() -> String {
    "mailto:admin@example.com".to_string()
}

fn default_icon() -> String {
    "/android-192x192.png".to_string()
}

fn default_badge() -> String {
    "/logo.png".to_string()
}

fn default_image() -> String {
    "/logo.png".to_string()
}

fn default_channel_buffer() -> usize {
    32
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SESSION__SECRET_KEY, PUSH__VAPID_PRIVATE_KEY, SUBSCRIPTIONS__BACKEND, ...
            .add_source(Environment::default().separator("__").try_parsing(true))
            // Flat names used by the cookie-issuing side of the deployment
            .set_override_option("api.key", env::var("API_KEY").ok())?
            .set_override_option("session.secret_key", env::var("SECRET_KEY").ok())?
            .set_override_option("session.salt", env::var("SALT").ok())?
            .set_override_option("push.vapid_private_key", env::var("VAPID_PRIVATE_KEY").ok())?;

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            key_prefix: default_identity_prefix(),
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            hash_key: default_subscription_hash(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            channel_buffer: default_channel_buffer(),
        }
    }
}

impl PushConfig {
    pub fn new(vapid_private_key: impl Into<String>) -> Self {
        Self {
            vapid_private_key: vapid_private_key.into(),
            subscriber: default_subscriber(),
            icon: default_icon(),
            badge: default_badge(),
            image: default_image(),
        }
    }
}
