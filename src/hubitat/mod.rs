pub mod models;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::config::{redact_url, ConfigError, HubSettings};

use self::models::DeviceRecord;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Whether retrying the same request later can be expected to help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("hub unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("hub returned status {0}")]
    Status(StatusCode),

    #[error("hub rejected credentials (status {0})")]
    Unauthorized(StatusCode),

    #[error("hub response is not a JSON array of devices: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Transport(_) | FetchError::Status(_) => FetchErrorKind::Transient,
            FetchError::Unauthorized(_) | FetchError::Malformed(_) => FetchErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FetchErrorKind::Transient
    }
}

/// Classify a non-success status. Authentication and authorisation failures
/// need an operator to fix the token; everything else may clear up.
fn status_error(status: StatusCode) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized(status),
        _ => FetchError::Status(status),
    }
}

// ---------------------------------------------------------------------------
// DeviceSource
// ---------------------------------------------------------------------------

/// Anything that can list the current state of every device.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<DeviceRecord>, FetchError>;
}

// ---------------------------------------------------------------------------
// HubClient
// ---------------------------------------------------------------------------

/// Client for the Maker API `devices/all` listing.
#[derive(Debug, Clone)]
pub struct HubClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    endpoint: Url,
}

impl HubClient {
    /// Resolve the endpoint from `settings` and build the HTTP client.
    /// Fails before any request is made if the endpoint cannot be resolved.
    pub fn new(settings: &HubSettings, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = settings.endpoint()?;
        Self::with_endpoint(endpoint, timeout)
    }

    pub fn with_endpoint(endpoint: Url, timeout: Duration) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "HUBITAT_TIMEOUT_SECS",
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            inner: Arc::new(Inner { http, endpoint }),
        })
    }

    /// Endpoint with the access token masked, for logs.
    pub fn endpoint_for_display(&self) -> String {
        redact_url(self.inner.endpoint.as_str())
    }
}

#[async_trait]
impl DeviceSource for HubClient {
    /// Fetch every device from the hub. No filtering happens here; records
    /// without a usable id are dropped later during extraction.
    async fn fetch_all(&self) -> Result<Vec<DeviceRecord>, FetchError> {
        debug!(url = %self.endpoint_for_display(), "Fetching hub devices");

        let resp = self
            .inner
            .http
            .get(self.inner.endpoint.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;

        let devices = serde_json::from_slice::<Vec<DeviceRecord>>(&bytes)
            .map_err(FetchError::Malformed)?;

        debug!(count = devices.len(), "Hub devices decoded");
        Ok(devices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
