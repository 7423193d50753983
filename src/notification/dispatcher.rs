use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::metrics::DispatchMetrics;
use crate::providers::AdapterRegistry;

use super::{
    Channel, DeliveryError, DeliveryReporter, NotificationEvent, TopicPublish, TracingReporter,
};

/// What happened to one envelope.
///
/// Informational only: dispatch never fails at its boundary, and the event
/// source acknowledges the envelope whatever the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Delivered { channel: Channel },
    Failed { channel: Channel, error: DeliveryError },
    UnknownChannel { channel: String },
    DecodeFailed,
}

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
struct DispatcherStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    unknown_channel: AtomicU64,
    decode_failed: AtomicU64,
}

impl DispatcherStats {
    fn snapshot(&self) -> DispatcherStatsSnapshot {
        let delivered = self.delivered.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let unknown_channel = self.unknown_channel.load(Ordering::Relaxed);
        let decode_failed = self.decode_failed.load(Ordering::Relaxed);

        DispatcherStatsSnapshot {
            total: delivered + failed + unknown_channel + decode_failed,
            delivered,
            failed,
            unknown_channel,
            decode_failed,
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total: u64,
    pub delivered: u64,
    pub failed: u64,
    pub unknown_channel: u64,
    pub decode_failed: u64,
}

/// Routes decoded notifications to the adapter serving their channel.
///
/// Stateless across events apart from counters; safe to share behind an
/// `Arc` between concurrent dispatches.
pub struct NotificationDispatcher {
    registry: AdapterRegistry,
    reporter: Arc<dyn DeliveryReporter>,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    /// Create a dispatcher that reports through logs and metrics
    pub fn new(registry: AdapterRegistry) -> Self {
        Self::with_reporter(registry, Arc::new(TracingReporter))
    }

    pub fn with_reporter(registry: AdapterRegistry, reporter: Arc<dyn DeliveryReporter>) -> Self {
        Self {
            registry,
            reporter,
            stats: DispatcherStats::default(),
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Decode a JSON envelope and dispatch the notification it carries
    pub async fn dispatch_bytes(&self, cancel: &CancellationToken, raw: &[u8]) -> DispatchOutcome {
        match serde_json::from_slice::<TopicPublish>(raw) {
            Ok(envelope) => self.dispatch(cancel, &envelope).await,
            Err(e) => self.decode_failed(&String::from_utf8_lossy(raw), &e),
        }
    }

    /// Dispatch the notification carried by `envelope`.
    ///
    /// Exactly one outcome is reported per call. Cancelling `cancel` aborts
    /// an in-flight provider call, which is then reported as a transport
    /// failure.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip_all,
        fields(event_id = %envelope.event_id, dispatch_id = %Uuid::new_v4())
    )]
    pub async fn dispatch(&self, cancel: &CancellationToken, envelope: &TopicPublish) -> DispatchOutcome {
        let raw = &envelope.data.data;
        let event = match NotificationEvent::from_json(raw) {
            Ok(event) => event,
            Err(e) => return self.decode_failed(raw, &e),
        };

        let channel = match event.parsed_channel() {
            Ok(channel) => channel,
            Err(_) => return self.unknown_channel(event),
        };

        let Some(adapter) = self.registry.get(channel) else {
            return self.unknown_channel(event);
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(adapter.deliver(cancel, &event))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(DeliveryError::transport(format!(
                    "{} adapter panicked: {}",
                    adapter.name(),
                    panic_message(panic.as_ref())
                )))
            });
        DispatchMetrics::record_latency(channel.as_str(), started.elapsed());

        match outcome {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                self.reporter.delivered(channel, &event);
                DispatchOutcome::Delivered { channel }
            }
            Err(error) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.reporter.failed(channel, &event, &error);
                DispatchOutcome::Failed { channel, error }
            }
        }
    }

    fn decode_failed(&self, raw: &str, error: &serde_json::Error) -> DispatchOutcome {
        self.stats.decode_failed.fetch_add(1, Ordering::Relaxed);
        self.reporter.decode_failed(raw, error);
        DispatchOutcome::DecodeFailed
    }

    fn unknown_channel(&self, event: NotificationEvent) -> DispatchOutcome {
        self.stats.unknown_channel.fetch_add(1, Ordering::Relaxed);
        self.reporter.unknown_channel(&event);
        DispatchOutcome::UnknownChannel {
            channel: event.channel,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
