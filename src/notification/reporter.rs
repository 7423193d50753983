use crate::metrics::DispatchMetrics;

use super::{Channel, DeliveryError, NotificationEvent};

/// Sink for dispatch outcomes.
///
/// The dispatcher calls exactly one of these methods per event it receives.
/// Implementations must not block; they run on the dispatch path.
pub trait DeliveryReporter: Send + Sync {
    /// The envelope or the notification inside it was not valid JSON
    fn decode_failed(&self, raw: &str, error: &serde_json::Error);

    /// The event named a channel with no known provider
    fn unknown_channel(&self, event: &NotificationEvent);

    fn delivered(&self, channel: Channel, event: &NotificationEvent);

    fn failed(&self, channel: Channel, event: &NotificationEvent, error: &DeliveryError);
}

/// Reports outcomes as structured log records and Prometheus counters
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl DeliveryReporter for TracingReporter {
    fn decode_failed(&self, raw: &str, error: &serde_json::Error) {
        DispatchMetrics::record_decode_failure();
        tracing::warn!(raw = %raw, error = %error, "Cannot decode notification data");
    }

    fn unknown_channel(&self, event: &NotificationEvent) {
        DispatchMetrics::record_unknown_channel();
        tracing::warn!(
            channel = %event.channel,
            event = ?event,
            "Unknown device channel, notification dropped"
        );
    }

    fn delivered(&self, channel: Channel, event: &NotificationEvent) {
        DispatchMetrics::record_delivered(channel.as_str());
        tracing::info!(
            channel = %channel,
            device_token = %event.device_token,
            provider_id = %event.provider_id,
            source = %event.source(),
            "Push notification delivered"
        );
    }

    fn failed(&self, channel: Channel, event: &NotificationEvent, error: &DeliveryError) {
        DispatchMetrics::record_failed(channel.as_str(), &error.reason);
        tracing::error!(
            channel = %channel,
            device_token = %event.device_token,
            provider_id = %event.provider_id,
            source = %event.source(),
            status = %error.status,
            code = %error.code,
            reason = %error.reason,
            detail = %error.message,
            "Cannot push notification"
        );
    }
}
