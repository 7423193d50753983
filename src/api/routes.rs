use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;
use crate::triggers::pubsub_push;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Push endpoint
        .route("/pubsub", post(pubsub_push))
}
