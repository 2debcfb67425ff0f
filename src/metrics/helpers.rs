//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    AUTH_FAILURES_TOTAL, CONNECTIONS_ADMITTED_TOTAL, CONNECTIONS_DISPLACED_TOTAL,
    CONNECTIONS_LIVE, DELIVERIES_TOTAL, DISPATCHES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_admitted(live: usize) {
        CONNECTIONS_ADMITTED_TOTAL.inc();
        CONNECTIONS_LIVE.set(live as i64);
    }

    pub fn record_displaced() {
        CONNECTIONS_DISPLACED_TOTAL.inc();
    }

    pub fn record_live(live: usize) {
        CONNECTIONS_LIVE.set(live as i64);
    }

    pub fn record_auth_failure() {
        AUTH_FAILURES_TOTAL.inc();
    }
}

/// Helper struct for recording dispatch metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_user_dispatch() {
        DISPATCHES_TOTAL.with_label_values(&["user"]).inc();
    }

    pub fn record_broadcast_dispatch() {
        DISPATCHES_TOTAL.with_label_values(&["all"]).inc();
    }

    pub fn record_live(outcome: &str) {
        DELIVERIES_TOTAL.with_label_values(&["live", outcome]).inc();
    }

    pub fn record_push(outcome: &str) {
        DELIVERIES_TOTAL.with_label_values(&["push", outcome]).inc();
    }
}
