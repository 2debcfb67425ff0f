//! Prometheus metrics for the relay.
//!
//! - Connection metrics (live connections, admissions, displacements)
//! - Dispatch metrics by target and transport
//! - Session resolution failures

mod helpers;

pub use helpers::{encode_metrics, ConnectionMetrics, DeliveryMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Live WebSocket connections currently registered
    pub static ref CONNECTIONS_LIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_live", METRIC_PREFIX),
        "Number of live WebSocket connections"
    ).unwrap();

    /// Connections admitted into the registry
    pub static ref CONNECTIONS_ADMITTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_connections_admitted_total", METRIC_PREFIX),
        "Total connections admitted"
    ).unwrap();

    /// Connections closed because the same user connected again
    pub static ref CONNECTIONS_DISPLACED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_connections_displaced_total", METRIC_PREFIX),
        "Total connections replaced by a newer connection for the same user"
    ).unwrap();

    /// Rejected session credentials
    pub static ref AUTH_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_auth_failures_total", METRIC_PREFIX),
        "Total session credentials rejected"
    ).unwrap();

    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Dispatches accepted by target kind
    pub static ref DISPATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatches_total", METRIC_PREFIX),
        "Total notifications dispatched",
        &["target"]
    ).unwrap();

    /// Per-recipient delivery outcomes by transport
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Per-recipient delivery attempts",
        &["transport", "outcome"]
    ).unwrap();
}
