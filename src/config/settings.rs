use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::notification::PayloadOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub apns: ApnsConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub otel: OtelConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Time in-flight HTTP dispatches get to finish after a shutdown signal
    #[serde(default = "default_drain_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Apple Push Notification service credentials and routing.
///
/// The signing key, key identifier and team identifier are issued together
/// by the Apple developer portal; `topic` is the app bundle identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct ApnsConfig {
    #[serde(default = "default_key_path")]
    pub key_path: String,
    pub key_id: String,
    pub team_id: String,
    pub topic: String,
    /// Target api.push.apple.com instead of the sandbox
    #[serde(default = "default_production")]
    pub production: bool,
    /// Upper bound for a single delivery call in milliseconds
    #[serde(default = "default_apns_timeout_ms")]
    pub timeout_ms: u64,
}

impl ApnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadConfig {
    #[serde(default = "default_badge")]
    pub badge: u32,
    #[serde(default = "default_sound")]
    pub sound: String,
}

impl PayloadConfig {
    pub fn options(&self) -> PayloadOptions {
        PayloadOptions {
            badge: self.badge,
            sound: self.sound.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default)]
    pub channels: Vec<String>,
    /// Maximum number of envelopes dispatched concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Time in-flight dispatches get to finish after a shutdown signal
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl RedisConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_key_path() -> String {
    "./apns.p8".to_string()
}

fn default_production() -> bool {
    true
}

fn default_apns_timeout_ms() -> u64 {
    10_000
}

fn default_badge() -> u32 {
    1
}

fn default_sound() -> String {
    "default".to_string()
}

fn default_redis_enabled() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_max_in_flight() -> usize {
    64
}

fn default_drain_timeout_ms() -> u64 {
    10_000
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "push-dispatch-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("apns.key_path", "./apns.p8")?
            .set_default("apns.production", true)?
            .set_default("redis.url", "redis://localhost:6379")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // PUSH__APNS__KEY_ID, PUSH__REDIS__URL, PUSH__SERVER__PORT, etc.
            .add_source(
                Environment::with_prefix("PUSH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("redis.channels"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            badge: default_badge(),
            sound: default_sound(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            channels: vec![],
            max_in_flight: default_max_in_flight(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
