// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain layer
pub mod notification;
pub mod providers;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
