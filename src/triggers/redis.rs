use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::RedisConfig;
use crate::metrics::RedisMetrics;
use crate::notification::NotificationDispatcher;

use super::backoff::ExponentialBackoff;

const DEFAULT_CHANNEL: &str = "push:notifications";

/// Redis Pub/Sub subscriber.
///
/// Every message payload is a JSON topic envelope. Messages are dispatched
/// concurrently, at most `max_in_flight` at a time. The shutdown token stops
/// intake only; in-flight dispatches run on a separate token that is
/// cancelled once `drain_timeout` has passed.
pub struct RedisSubscriber {
    config: RedisConfig,
    dispatcher: Arc<NotificationDispatcher>,
    shutdown: CancellationToken,
    dispatch_cancel: CancellationToken,
    in_flight: Arc<Semaphore>,
}

impl RedisSubscriber {
    pub fn new(
        config: RedisConfig,
        dispatcher: Arc<NotificationDispatcher>,
        shutdown: CancellationToken,
    ) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Self {
            config,
            dispatcher,
            shutdown,
            dispatch_cancel: CancellationToken::new(),
            in_flight,
        }
    }

    /// Run until the shutdown token is cancelled, reconnecting on failure
    pub async fn start(&self) -> anyhow::Result<()> {
        if !self.config.enabled {
            tracing::info!("Redis subscriber disabled");
            return Ok(());
        }

        let channels = self.channels();
        tracing::info!(channels = ?channels, "Starting Redis subscriber");

        let mut backoff = ExponentialBackoff::default();

        while !self.shutdown.is_cancelled() {
            match self.run_subscription_loop(&channels, &mut backoff).await {
                Ok(()) => break,
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Redis subscription error, reconnecting"
                    );
                    RedisMetrics::record_reconnection();

                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.drain().await;
        tracing::info!("Redis subscriber stopped");
        Ok(())
    }

    fn channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    /// Returns `Ok` only on shutdown; a dropped connection is an error
    async fn run_subscription_loop(
        &self,
        channels: &[String],
        backoff: &mut ExponentialBackoff,
    ) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if is_pattern(channel) {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");
        backoff.reset();

        let mut message_stream = pubsub.on_message();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };
                    RedisMetrics::record_message_received();

                    let channel = msg.get_channel_name().to_string();
                    let payload = msg.get_payload_bytes().to_vec();
                    self.spawn_dispatch(channel, payload).await;
                }
            }
        }
    }

    async fn spawn_dispatch(&self, channel: String, payload: Vec<u8>) {
        let permit = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            permit = self.in_flight.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        let dispatcher = self.dispatcher.clone();
        let cancel = self.dispatch_cancel.child_token();

        tokio::spawn(async move {
            let _permit = permit;
            tracing::debug!(channel = %channel, "Received Redis message");
            let outcome = dispatcher.dispatch_bytes(&cancel, &payload).await;
            tracing::debug!(channel = %channel, outcome = ?outcome, "Dispatched notification from Redis");
        });
    }

    /// Wait for in-flight dispatches, cancelling them after the drain deadline
    async fn drain(&self) {
        let all = self.config.max_in_flight.max(1) as u32;

        let drain_timeout = self.config.drain_timeout();
        let waited = tokio::time::timeout(drain_timeout, self.in_flight.acquire_many(all)).await;
        if waited.is_err() {
            tracing::warn!(
                pending = all as usize - self.in_flight.available_permits(),
                "Drain deadline reached, cancelling in-flight dispatches"
            );
            self.dispatch_cancel.cancel();
            if let Ok(permits) = self.in_flight.acquire_many(all).await {
                drop(permits);
            }
        }
    }
}

fn is_pattern(channel: &str) -> bool {
    channel.contains(['*', '?', '['])
}
