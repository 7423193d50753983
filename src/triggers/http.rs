//! HTTP push endpoint for Pub/Sub-style envelopes.

use axum::{body::Bytes, extract::State, http::StatusCode};

use crate::server::AppState;

/// POST /pubsub
///
/// Always acknowledges with 204 so the publisher never redelivers. The
/// dispatch runs on its own task: a client that disconnects or times out
/// cannot abort a delivery already handed to a provider, and its outcome is
/// still reported.
pub async fn pubsub_push(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let dispatcher = state.dispatcher.clone();
    let cancel = state.dispatch_cancel.child_token();

    state.in_flight.spawn(async move {
        let outcome = dispatcher.dispatch_bytes(&cancel, &body).await;
        tracing::debug!(outcome = ?outcome, "Dispatched notification from HTTP push");
    });

    StatusCode::NO_CONTENT
}
