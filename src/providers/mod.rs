//! Provider transport adapters.
//!
//! Each push channel is served by one [`ProviderAdapter`]. Adapters wrap a
//! long-lived, pre-authenticated client handle and reduce the provider's
//! answer to a [`DeliveryOutcome`]. The [`AdapterRegistry`] maps channels to
//! adapters once at startup; adding a channel means registering an adapter,
//! not editing the dispatcher.

mod apns_client;
mod apple;
pub mod firebase;
mod noop;
mod token;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::Result;
use crate::notification::{Channel, DeliveryOutcome, NotificationEvent};

pub use apns_client::{
    ApnsClient, ApnsClientError, ApnsEndpoint, ApnsNotification, ApnsResponse, HttpApnsClient,
};
pub use apple::AppleAdapter;
pub use firebase::{FirebaseAdapter, FirebaseClient, FirebaseClientError};
pub use noop::NoopAdapter;
pub use token::ProviderToken;

/// Delivers one notification through one provider.
///
/// Implementations must honor `cancel` promptly, must not retry, and must
/// convert every failure into a `DeliveryError` instead of propagating it.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn deliver(&self, cancel: &CancellationToken, event: &NotificationEvent)
        -> DeliveryOutcome;

    /// Adapter name for logs
    fn name(&self) -> &'static str;
}

/// Channel to adapter routing table, built once and shared read-only
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<Channel, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Registry with every channel served by a [`NoopAdapter`]
    pub fn new() -> Self {
        let noop: Arc<dyn ProviderAdapter> = Arc::new(NoopAdapter);
        let adapters = Channel::ALL
            .into_iter()
            .map(|channel| (channel, noop.clone()))
            .collect();
        Self { adapters }
    }

    /// Production routing: `apple` through APNs, every other channel unchanged.
    ///
    /// Loads the APNs signing key; an unreadable or invalid key is fatal.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = HttpApnsClient::from_config(&settings.apns)?;
        tracing::info!(
            endpoint = client.endpoint().base_url(),
            topic = %settings.apns.topic,
            "APNs client initialized"
        );

        let apple = AppleAdapter::new(
            Arc::new(client),
            settings.apns.topic.clone(),
            settings.payload.options(),
            settings.apns.timeout(),
        );
        Ok(Self::new().with_adapter(Channel::Apple, Arc::new(apple)))
    }

    /// Replace the adapter serving `channel`
    pub fn with_adapter(mut self, channel: Channel, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(channel, adapter);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&channel)
    }

    /// (channel, adapter name) pairs, sorted by channel name
    pub fn routes(&self) -> Vec<(Channel, &'static str)> {
        let mut routes: Vec<_> = self
            .adapters
            .iter()
            .map(|(channel, adapter)| (*channel, adapter.name()))
            .collect();
        routes.sort_by_key(|(channel, _)| channel.as_str());
        routes
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
