//! Token-authenticated HTTP/2 client for the Apple Push Notification service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ApnsConfig;
use crate::notification::ApplePayload;

use super::ProviderToken;

#[derive(Debug, Error)]
pub enum ApnsClientError {
    #[error("failed to read signing key {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid signing key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign provider token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("invalid authorization header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("invalid device token {0:?}")]
    InvalidDeviceToken(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApnsEndpoint {
    Production,
    Development,
}

impl ApnsEndpoint {
    pub fn base_url(&self) -> &'static str {
        match self {
            ApnsEndpoint::Production => "https://api.push.apple.com",
            ApnsEndpoint::Development => "https://api.sandbox.push.apple.com",
        }
    }

    pub fn from_production_flag(production: bool) -> Self {
        if production {
            ApnsEndpoint::Production
        } else {
            ApnsEndpoint::Development
        }
    }
}

/// One push addressed to one device
#[derive(Debug, Clone, PartialEq)]
pub struct ApnsNotification {
    pub device_token: String,
    pub topic: String,
    pub push_type: &'static str,
    pub payload: ApplePayload,
}

/// APNs answer to a request that reached the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnsResponse {
    pub status_code: u16,
    /// Value of the `apns-id` response header
    pub apns_id: String,
    /// Rejection reason from the response body, empty when sent
    pub reason: String,
}

impl ApnsResponse {
    pub fn sent(&self) -> bool {
        self.status_code == 200
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApnsErrorBody {
    #[serde(default)]
    reason: String,
}

/// Pre-authenticated APNs capability.
///
/// Shared by all concurrent dispatches; implementations must be safe for
/// concurrent calls.
#[async_trait]
pub trait ApnsClient: Send + Sync {
    async fn push(&self, notification: &ApnsNotification) -> Result<ApnsResponse, ApnsClientError>;
}

/// APNs client over reqwest.
///
/// `reqwest::Client` pools connections internally and is safe to share.
#[derive(Debug)]
pub struct HttpApnsClient {
    http: reqwest::Client,
    endpoint: ApnsEndpoint,
    token: ProviderToken,
}

impl HttpApnsClient {
    pub fn new(endpoint: ApnsEndpoint, token: ProviderToken) -> Result<Self, ApnsClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(600))
            .http2_keep_alive_interval(Duration::from_secs(60))
            .build()
            .map_err(ApnsClientError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    /// Load the signing key and build the client; called once at startup
    pub fn from_config(config: &ApnsConfig) -> Result<Self, ApnsClientError> {
        let token = ProviderToken::from_file(&config.key_path, &config.key_id, &config.team_id)?;
        Self::new(ApnsEndpoint::from_production_flag(config.production), token)
    }

    pub fn endpoint(&self) -> ApnsEndpoint {
        self.endpoint
    }

    /// `{endpoint}/3/device/{token}` with the token escaped as one path segment
    fn device_url(&self, device_token: &str) -> Result<Url, ApnsClientError> {
        let invalid = || ApnsClientError::InvalidDeviceToken(device_token.to_string());
        if matches!(device_token, "" | "." | "..") {
            return Err(invalid());
        }

        let mut url = Url::parse(self.endpoint.base_url()).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .clear()
            .extend(["3", "device", device_token]);
        Ok(url)
    }
}

#[async_trait]
impl ApnsClient for HttpApnsClient {
    async fn push(&self, notification: &ApnsNotification) -> Result<ApnsResponse, ApnsClientError> {
        let bearer = self.token.bearer()?;
        let authorization = HeaderValue::from_str(&format!("bearer {}", bearer))?;

        let response = self
            .http
            .post(self.device_url(&notification.device_token)?)
            .header(AUTHORIZATION, authorization)
            .header("apns-topic", &notification.topic)
            .header("apns-push-type", notification.push_type)
            .json(&notification.payload)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let apns_id = response
            .headers()
            .get("apns-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if status_code == 200 {
            return Ok(ApnsResponse {
                status_code,
                apns_id,
                reason: String::new(),
            });
        }

        let body: ApnsErrorBody = response.json().await.unwrap_or_default();
        if body.reason == "ExpiredProviderToken" {
            self.token.invalidate();
        }

        Ok(ApnsResponse {
            status_code,
            apns_id,
            reason: body.reason,
        })
    }
}
