//! API layer - HTTP endpoint handlers organized by domain.

mod connection;
mod health;
mod metrics;
mod routes;

// Re-export all handlers for use in server/app.rs
pub use connection::{connection_count, ConnectionCountResponse};
pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use routes::admin_routes;
