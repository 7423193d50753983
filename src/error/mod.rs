use thiserror::Error;

use crate::providers::ApnsClientError;
use crate::telemetry::TelemetryError;

/// Startup and runtime errors outside of per-event dispatch.
///
/// Delivery failures never surface here; they are normalized into
/// [`DeliveryError`](crate::notification::DeliveryError) and reported.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("APNs client initialization failed: {0}")]
    Apns(#[from] ApnsClientError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
