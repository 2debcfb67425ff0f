mod settings;

pub use settings::{
    ApiConfig, IdentityConfig, PushConfig, RedisConfig, ServerConfig, SessionConfig, Settings,
    SubscriptionConfig, WebSocketConfig,
};
