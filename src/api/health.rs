//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub apns_endpoint: String,
    pub redis_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub notifications: DispatcherStatsSnapshot,
    pub routes: Vec<RouteInfo>,
}

#[derive(Debug, Serialize)]
pub struct RouteInfo {
    pub channel: String,
    pub adapter: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        apns_endpoint: state.apns_endpoint.base_url().to_string(),
        redis_enabled: state.settings.redis.enabled,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let routes = state
        .dispatcher
        .registry()
        .routes()
        .into_iter()
        .map(|(channel, adapter)| RouteInfo {
            channel: channel.to_string(),
            adapter: adapter.to_string(),
        })
        .collect();

    Json(StatsResponse {
        notifications: state.dispatcher.stats(),
        routes,
    })
}
