//! Shared HTTP plumbing for provider requests

use reqwest::{Client, Url};
use std::time::Duration;

use callguard_config::TelephonyConfig;
use callguard_core::{CallControlError, NotifyError};

use crate::TelephonyError;

/// Outcome of a provider request that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderHttpError {
    MissingCredentials,
    Timeout,
    Network(String),
    Status { status: u16, body: String },
    InvalidPath(String),
}

impl From<ProviderHttpError> for CallControlError {
    fn from(err: ProviderHttpError) -> Self {
        match err {
            ProviderHttpError::MissingCredentials => CallControlError::MissingCredentials,
            ProviderHttpError::Timeout => CallControlError::Timeout,
            ProviderHttpError::Network(m) => CallControlError::Network(m),
            ProviderHttpError::Status { status, body } => CallControlError::Provider { status, body },
            ProviderHttpError::InvalidPath(m) => CallControlError::Configuration(m),
        }
    }
}

impl From<ProviderHttpError> for NotifyError {
    fn from(err: ProviderHttpError) -> Self {
        match err {
            ProviderHttpError::MissingCredentials => NotifyError::MissingCredentials,
            ProviderHttpError::Timeout => NotifyError::Timeout,
            ProviderHttpError::Network(m) => NotifyError::Network(m),
            ProviderHttpError::Status { status, body } => NotifyError::Gateway { status, body },
            ProviderHttpError::InvalidPath(m) => NotifyError::Configuration(m),
        }
    }
}

/// Authenticated JSON POSTs against the provider API.
///
/// One request per call, bounded by the configured timeout, never retried.
#[derive(Clone)]
pub struct ProviderHttp {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ProviderHttp {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TelephonyError> {
        let base_url = Url::parse(base_url).map_err(|e| TelephonyError::InvalidBaseUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TelephonyError::InvalidBaseUrl {
                url: base_url.to_string(),
                message: "URL cannot carry a path".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelephonyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn from_config(config: &TelephonyConfig) -> Result<Self, TelephonyError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderHttpError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ProviderHttpError::InvalidPath(format!("{} cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// POST a JSON body. Credentials are checked before any network activity.
    pub async fn post_json(
        &self,
        segments: &[&str],
        body: &serde_json::Value,
    ) -> Result<(), ProviderHttpError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderHttpError::MissingCredentials)?;
        let url = self.endpoint(segments)?;

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderHttpError::Timeout
                } else {
                    ProviderHttpError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderHttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
