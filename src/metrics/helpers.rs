//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DECODE_FAILURES_TOTAL, DELIVERY_LATENCY, DISPATCH_TOTAL, REDIS_MESSAGES_RECEIVED,
    REDIS_RECONNECTIONS_TOTAL, REJECTIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch outcomes
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_delivered(channel: &str) {
        DISPATCH_TOTAL.with_label_values(&[channel, "delivered"]).inc();
    }

    pub fn record_failed(channel: &str, reason: &str) {
        DISPATCH_TOTAL.with_label_values(&[channel, "failed"]).inc();
        REJECTIONS_TOTAL.with_label_values(&[channel, reason]).inc();
    }

    /// Unrecognized channel values are bucketed together to keep label cardinality bounded
    pub fn record_unknown_channel() {
        DISPATCH_TOTAL.with_label_values(&["unknown", "unknown_channel"]).inc();
    }

    pub fn record_decode_failure() {
        DECODE_FAILURES_TOTAL.inc();
    }

    pub fn record_latency(channel: &str, elapsed: Duration) {
        DELIVERY_LATENCY
            .with_label_values(&[channel])
            .observe(elapsed.as_secs_f64());
    }
}

/// Helper struct for recording Redis event source metrics
pub struct RedisMetrics;

impl RedisMetrics {
    pub fn record_message_received() {
        REDIS_MESSAGES_RECEIVED.inc();
    }

    pub fn record_reconnection() {
        REDIS_RECONNECTIONS_TOTAL.inc();
    }
}
