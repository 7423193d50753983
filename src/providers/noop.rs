use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::notification::{DeliveryOutcome, NotificationEvent};

use super::ProviderAdapter;

/// Placeholder for channels without a transport yet; accepts and drops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAdapter;

#[async_trait]
impl ProviderAdapter for NoopAdapter {
    async fn deliver(&self, _cancel: &CancellationToken, event: &NotificationEvent) -> DeliveryOutcome {
        tracing::debug!(
            channel = %event.channel,
            device_token = %event.device_token,
            "No transport configured for channel, skipping delivery"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
