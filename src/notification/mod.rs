//! Notification data model, payload building, outcome normalization and dispatch.

mod delivery;
mod dispatcher;
mod payload;
mod reporter;
mod types;

pub use delivery::{
    normalize, DeliveryError, DeliveryOutcome, DeliveryStatus, ProviderResponse,
    CANCELLED_MESSAGE, DEADLINE_EXCEEDED_MESSAGE, INTERNAL_ERROR_REASON, TRANSPORT_ERROR_CODE,
};
pub use dispatcher::{DispatchOutcome, DispatcherStatsSnapshot, NotificationDispatcher};
pub use payload::{
    build_apple_payload, build_firebase_message, ApplePayload, Aps, FirebaseMessage,
    FirebaseNotification, PayloadOptions,
};
pub use reporter::{DeliveryReporter, TracingReporter};
pub use types::{
    Channel, NotificationContent, NotificationEvent, PubSubMessage, TopicPublish, UnknownChannel,
};
