//! Reconnection delays for event sources

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the delay randomized in either direction (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Exponential backoff with jitter.
///
/// The first delay equals `initial_delay`; each following delay grows by
/// `multiplier` until it reaches `max_delay`.
#[derive(Debug)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(32) as i32;
        self.attempt = self.attempt.saturating_add(1);

        let base = self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(exponent);
        let capped = base.min(self.config.max_delay.as_millis() as f64);

        let jitter_range = capped * self.config.jitter_factor.clamp(0.0, 1.0);
        let delay = if jitter_range > 0.0 {
            capped + rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            capped
        };

        Duration::from_millis(delay.max(1.0) as u64)
    }

    /// Call once a connection has been re-established
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
