use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::notification::{
    build_apple_payload, normalize, DeliveryError, DeliveryOutcome, NotificationEvent,
    PayloadOptions, ProviderResponse,
};

use super::{ApnsClient, ApnsNotification, ApnsResponse, ProviderAdapter};

const PUSH_TYPE_ALERT: &str = "alert";

/// Delivers `apple` channel events through APNs
pub struct AppleAdapter {
    client: Arc<dyn ApnsClient>,
    topic: String,
    payload_options: PayloadOptions,
    timeout: Duration,
}

impl AppleAdapter {
    pub fn new(
        client: Arc<dyn ApnsClient>,
        topic: impl Into<String>,
        payload_options: PayloadOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            topic: topic.into(),
            payload_options,
            timeout,
        }
    }

    pub fn notification_for(&self, event: &NotificationEvent) -> ApnsNotification {
        ApnsNotification {
            device_token: event.device_token.clone(),
            topic: self.topic.clone(),
            push_type: PUSH_TYPE_ALERT,
            payload: build_apple_payload(&event.data, &self.payload_options),
        }
    }
}

impl From<ApnsResponse> for ProviderResponse {
    fn from(response: ApnsResponse) -> Self {
        if response.sent() {
            ProviderResponse::Sent
        } else {
            ProviderResponse::Rejected {
                status_code: response.status_code,
                reason: response.reason,
                delivery_id: response.apns_id,
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for AppleAdapter {
    #[tracing::instrument(
        name = "apple.deliver",
        skip(self, cancel, event),
        fields(device_token = %event.device_token, topic = %self.topic)
    )]
    async fn deliver(&self, cancel: &CancellationToken, event: &NotificationEvent) -> DeliveryOutcome {
        let notification = self.notification_for(event);
        tracing::debug!(notification = ?notification, "Apple message");

        let pushed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DeliveryError::cancelled()),
            pushed = tokio::time::timeout(self.timeout, self.client.push(&notification)) => pushed,
        };

        match pushed {
            Ok(result) => normalize(result.map(ProviderResponse::from)),
            Err(_elapsed) => Err(DeliveryError::deadline_exceeded()),
        }
    }

    fn name(&self) -> &'static str {
        "apns"
    }
}
