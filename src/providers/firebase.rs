//! Firebase Cloud Messaging error classification.
//!
//! Firebase Admin clients report failures as a single line such as
//!
//! ```text
//! http error status: 404; reason: app instance has been unregistered; code: registration-token-not-registered; details: Requested entity was not found.
//! ```
//!
//! [`parse_firebase_error`] locates each field by its label rather than by
//! fixed offsets, so fields may be missing or reordered. A line without an
//! HTTP status never reached Firebase and is treated as a transport error.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::notification::{
    build_firebase_message, DeliveryError, DeliveryOutcome, FirebaseMessage, NotificationEvent,
};

use super::ProviderAdapter;

pub const HTTP_STATUS_LABEL: &str = "http error status: ";
pub const REASON_LABEL: &str = "reason: ";
pub const CODE_LABEL: &str = "code: ";
pub const DETAILS_LABEL: &str = "details: ";

const FIELD_SEPARATOR: &str = "; ";

const LABELS: [&str; 4] = [HTTP_STATUS_LABEL, REASON_LABEL, CODE_LABEL, DETAILS_LABEL];

/// Fields extracted from a Firebase error line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirebaseErrorParts {
    pub http_status: String,
    pub reason: Option<String>,
    pub code: Option<String>,
    pub details: Option<String>,
}

/// Split a Firebase error line into its labelled fields.
///
/// Returns `None` unless an `http error status` field with a numeric value
/// is present.
pub fn parse_firebase_error(line: &str) -> Option<FirebaseErrorParts> {
    let http_status = extract_field(line, HTTP_STATUS_LABEL)?;
    if http_status.is_empty() || !http_status.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(FirebaseErrorParts {
        http_status,
        reason: extract_field(line, REASON_LABEL),
        code: extract_field(line, CODE_LABEL),
        details: extract_field(line, DETAILS_LABEL),
    })
}

/// Value following `label`, up to the next `"; "` that starts another label
fn extract_field(line: &str, label: &str) -> Option<String> {
    let start = find_label(line, label)? + label.len();
    let rest = &line[start..];

    let end = LABELS
        .iter()
        .filter_map(|next| {
            let anchor = format!("{}{}", FIELD_SEPARATOR, next);
            rest.find(&anchor)
        })
        .min()
        .unwrap_or(rest.len());

    Some(rest[..end].trim().to_string())
}

/// Position of `label` at the start of the line or right after a separator
fn find_label(line: &str, label: &str) -> Option<usize> {
    if line.starts_with(label) {
        return Some(0);
    }
    let anchor = format!("{}{}", FIELD_SEPARATOR, label);
    line.find(&anchor).map(|pos| pos + FIELD_SEPARATOR.len())
}

/// Reduce a Firebase client error line to a [`DeliveryError`]
pub fn classify_firebase_error(line: &str) -> DeliveryError {
    match parse_firebase_error(line) {
        Some(parts) => {
            let reason = parts
                .code
                .clone()
                .or_else(|| parts.reason.clone())
                .unwrap_or_default();
            let message = parts.details.or(parts.reason).unwrap_or_default();
            DeliveryError::rejected(parts.http_status, reason, message)
        }
        None => DeliveryError::transport(line),
    }
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct FirebaseClientError(pub String);

/// Pre-authenticated FCM capability; returns the message name on success
#[async_trait]
pub trait FirebaseClient: Send + Sync {
    async fn send(&self, message: &FirebaseMessage) -> Result<String, FirebaseClientError>;
}

/// Delivers `google` or `web` channel events through FCM
pub struct FirebaseAdapter {
    client: Arc<dyn FirebaseClient>,
}

impl FirebaseAdapter {
    pub fn new(client: Arc<dyn FirebaseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for FirebaseAdapter {
    async fn deliver(&self, cancel: &CancellationToken, event: &NotificationEvent) -> DeliveryOutcome {
        let message = build_firebase_message(&event.device_token, &event.data);

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DeliveryError::cancelled()),
            sent = self.client.send(&message) => sent,
        };

        match sent {
            Ok(name) => {
                tracing::debug!(message_name = %name, "Firebase accepted message");
                Ok(())
            }
            Err(e) => Err(classify_firebase_error(&e.0)),
        }
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}
