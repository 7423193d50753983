//! Normalized delivery outcome shared by every provider adapter.
//!
//! Each provider reports success and failure differently. Adapters reduce
//! their raw result to a [`DeliveryOutcome`]: `Ok(())` when the provider
//! accepted the push, otherwise a [`DeliveryError`] carrying one of two
//! failure classes:
//!
//! - transport errors (the call itself did not complete), always coded
//!   `"500"` with reason [`INTERNAL_ERROR_REASON`]
//! - rejections (the provider answered but refused the push), carrying the
//!   provider's own status code and reason verbatim

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Reason token for failures that originate on our side of the wire
pub const INTERNAL_ERROR_REASON: &str = "INTERNAL_SERVER_ERROR";

/// Code assigned to every transport failure
pub const TRANSPORT_ERROR_CODE: &str = "500";

/// Message used when the caller cancels an in-flight delivery
pub const CANCELLED_MESSAGE: &str = "context canceled";

/// Message used when a delivery exceeds its deadline
pub const DEADLINE_EXCEEDED_MESSAGE: &str = "context deadline exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Fail,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Success => f.write_str("success"),
            DeliveryStatus::Fail => f.write_str("fail"),
        }
    }
}

/// A failed delivery attempt.
///
/// Success is never represented by this type; constructors only build
/// `status = fail` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("status={status} code={code} reason={reason} message={message}")]
pub struct DeliveryError {
    pub status: DeliveryStatus,
    pub code: String,
    pub reason: String,
    pub message: String,
}

pub type DeliveryOutcome = Result<(), DeliveryError>;

impl DeliveryError {
    /// The delivery call could not complete
    pub fn transport(err: impl fmt::Display) -> Self {
        Self {
            status: DeliveryStatus::Fail,
            code: TRANSPORT_ERROR_CODE.to_string(),
            reason: INTERNAL_ERROR_REASON.to_string(),
            message: err.to_string(),
        }
    }

    /// The provider received the push but declined to deliver it
    pub fn rejected(
        code: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: DeliveryStatus::Fail,
            code: code.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::transport(CANCELLED_MESSAGE)
    }

    pub fn deadline_exceeded() -> Self {
        Self::transport(DEADLINE_EXCEEDED_MESSAGE)
    }

    pub fn is_transport(&self) -> bool {
        self.code == TRANSPORT_ERROR_CODE && self.reason == INTERNAL_ERROR_REASON
    }
}

/// Provider answer for a call that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    Sent,
    Rejected {
        status_code: u16,
        reason: String,
        /// Provider-assigned identifier of the delivery attempt
        delivery_id: String,
    },
}

/// Reduce a raw provider result to a [`DeliveryOutcome`].
///
/// A client error wins over anything else; otherwise the provider's answer
/// decides between success and rejection.
pub fn normalize<E: fmt::Display>(result: Result<ProviderResponse, E>) -> DeliveryOutcome {
    match result {
        Err(e) => Err(DeliveryError::transport(e)),
        Ok(ProviderResponse::Sent) => Ok(()),
        Ok(ProviderResponse::Rejected {
            status_code,
            reason,
            delivery_id,
        }) => Err(DeliveryError::rejected(
            status_code.to_string(),
            reason,
            delivery_id,
        )),
    }
}
