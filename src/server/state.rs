use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Settings;
use crate::notification::NotificationDispatcher;
use crate::providers::ApnsEndpoint;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub apns_endpoint: ApnsEndpoint,
    pub start_time: Instant,
    /// Dispatches started by request handlers; they outlive the request
    pub in_flight: TaskTracker,
    /// Cancelled only once [`AppState::drain`] gives up waiting
    pub dispatch_cancel: CancellationToken,
}

impl AppState {
    pub fn new(settings: Settings, dispatcher: Arc<NotificationDispatcher>) -> Self {
        let apns_endpoint = ApnsEndpoint::from_production_flag(settings.apns.production);
        Self {
            settings: Arc::new(settings),
            dispatcher,
            apns_endpoint,
            start_time: Instant::now(),
            in_flight: TaskTracker::new(),
            dispatch_cancel: CancellationToken::new(),
        }
    }

    /// Wait for handler-spawned dispatches, cancelling them after `timeout`.
    ///
    /// Cancelled dispatches still report their outcome before this returns.
    pub async fn drain(&self, timeout: Duration) {
        self.in_flight.close();
        if tokio::time::timeout(timeout, self.in_flight.wait()).await.is_err() {
            tracing::warn!(
                pending = self.in_flight.len(),
                "Drain deadline reached, cancelling in-flight dispatches"
            );
            self.dispatch_cancel.cancel();
            self.in_flight.wait().await;
        }
    }
}
