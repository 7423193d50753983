//! Provider wire payloads built from a [`NotificationContent`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::NotificationContent;

/// Fields every Apple alert carries besides the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadOptions {
    pub badge: u32,
    pub sound: String,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            badge: 1,
            sound: "default".to_string(),
        }
    }
}

/// APNs request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplePayload {
    pub aps: Aps,
    /// Caller data, forwarded untouched
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aps {
    pub alert: String,
    pub badge: u32,
    pub sound: String,
}

pub fn build_apple_payload(content: &NotificationContent, options: &PayloadOptions) -> ApplePayload {
    ApplePayload {
        aps: Aps {
            alert: content.message.clone(),
            badge: options.badge,
            sound: options.sound.clone(),
        },
        data: content.data.clone(),
    }
}

/// FCM v1 message, used for both Android and Web push targets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirebaseMessage {
    pub token: String,
    pub notification: FirebaseNotification,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirebaseNotification {
    pub body: String,
}

/// FCM only accepts string data values, so anything else is sent as compact JSON.
pub fn build_firebase_message(device_token: &str, content: &NotificationContent) -> FirebaseMessage {
    let data = content
        .data
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect();

    FirebaseMessage {
        token: device_token.to_string(),
        notification: FirebaseNotification {
            body: content.message.clone(),
        },
        data,
    }
}
