// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;

// Domain layer
pub mod auth;
pub mod connection_manager;
pub mod notification;
pub mod push;
pub mod subscription;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
pub mod websocket;
