//! Prometheus metrics for the push dispatcher.
//!
//! - Dispatch outcomes per channel (delivered, failed, unknown channel)
//! - Provider rejections by reason
//! - Delivery latency per channel
//! - Redis event source health

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, RedisMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "push";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Dispatched events by channel and outcome
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Total notification events dispatched",
        &["channel", "outcome"]
    ).unwrap();

    /// Envelopes or events that could not be decoded
    pub static ref DECODE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_decode_failures_total", METRIC_PREFIX),
        "Total envelopes dropped because they could not be decoded"
    ).unwrap();

    /// Failed deliveries by channel and normalized reason
    pub static ref REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_rejections_total", METRIC_PREFIX),
        "Total failed deliveries by reason",
        &["channel", "reason"]
    ).unwrap();

    /// Time spent inside a provider adapter
    pub static ref DELIVERY_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Provider delivery latency in seconds",
        &["channel"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Redis Metrics
    // ============================================================================

    /// Redis pub/sub messages received
    pub static ref REDIS_MESSAGES_RECEIVED: IntCounter = register_int_counter!(
        format!("{}_redis_messages_received_total", METRIC_PREFIX),
        "Total messages received from Redis pub/sub"
    ).unwrap();

    /// Total Redis reconnection attempts
    pub static ref REDIS_RECONNECTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_redis_reconnections_total", METRIC_PREFIX),
        "Total Redis reconnection attempts"
    ).unwrap();
}
