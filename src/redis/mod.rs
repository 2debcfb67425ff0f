//! Redis connectivity for the persistence-backed adapters.

pub mod pool;

pub use pool::{PoolError, RedisPool};
