//! Push subscription storage keyed by user identity.

mod backend;
mod factory;
mod memory_backend;
mod redis_backend;

pub use backend::{
    SubscriptionKeys, SubscriptionRecord, SubscriptionStore, SubscriptionStoreError,
    SubscriptionStream,
};
pub use factory::create_subscription_store;
pub use memory_backend::MemorySubscriptionStore;
pub use redis_backend::RedisSubscriptionStore;
