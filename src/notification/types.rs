use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Provider family a device token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Apple,
    Google,
    Web,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Apple, Channel::Google, Channel::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Apple => "apple",
            Channel::Google => "google",
            Channel::Web => "web",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel: {0:?}")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apple" => Ok(Channel::Apple),
            "google" => Ok(Channel::Google),
            "web" => Ok(Channel::Web),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

/// A single push notification addressed to one device.
///
/// `channel` keeps the raw wire value so that events for channels this
/// service does not know about still decode and can be logged as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provider_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub device_token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: NotificationContent,
}

/// Provider-agnostic message body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
}

/// Treat an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl NotificationEvent {
    /// Decode an event from the JSON string carried inside an envelope
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn parsed_channel(&self) -> Result<Channel, UnknownChannel> {
        self.channel.parse()
    }

    /// Originating feature of the notification, taken from `data.type`.
    pub fn source(&self) -> String {
        match self.data.data.get("type") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        }
    }
}

/// Envelope delivered by the event source.
///
/// Only `data.data` is consumed; the remaining fields are kept for logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicPublish {
    #[serde(default)]
    pub data: PubSubMessage,
    #[serde(rename = "eventID", default)]
    pub event_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "eventType", default)]
    pub event_type: String,
    #[serde(default)]
    pub resource: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PubSubMessage {
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// JSON-encoded [`NotificationEvent`]
    #[serde(default)]
    pub data: String,
}

impl TopicPublish {
    /// Wrap an already-encoded notification in an envelope
    pub fn wrap(notification_json: impl Into<String>) -> Self {
        Self {
            data: PubSubMessage {
                attributes: HashMap::new(),
                data: notification_json.into(),
            },
            ..Default::default()
        }
    }
}
