//! Client for the legacy system's HTTP API.
//!
//! Only the mapping-reference importer talks to it: given a mapping
//! expression it asks the legacy deployment what that mapping was, so the
//! mapping can be matched against its imported counterpart.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::LegacyApiConfig;
use crate::error::{Error, Result};
use crate::http::{create_http_client, validate_url};

/// Read access to legacy resources by expression.
#[async_trait]
pub trait LegacyApi: Send + Sync {
    /// Fetches the resource at `expression`.
    ///
    /// Returns `Ok(None)` for any non-200 answer; transport failures are
    /// errors.
    async fn fetch(&self, expression: &str) -> Result<Option<Value>>;
}

/// [`LegacyApi`] over HTTP.
pub struct HttpLegacyApi {
    client: Client,
    base_url: String,
}

impl HttpLegacyApi {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an http(s) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_url(base_url)?;
        Ok(Self {
            client: create_http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client from configuration, if a base URL is configured.
    pub fn from_config(config: &LegacyApiConfig) -> Result<Option<Self>> {
        config
            .resolve_base_url()
            .map(|url| Self::new(&url, Duration::from_secs(config.timeout_secs)))
            .transpose()
    }

    /// Base URL requests are made against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, expression: &str) -> String {
        if expression.starts_with('/') {
            format!("{}{}", self.base_url, expression)
        } else {
            format!("{}/{}", self.base_url, expression)
        }
    }
}

#[async_trait]
impl LegacyApi for HttpLegacyApi {
    async fn fetch(&self, expression: &str) -> Result<Option<Value>> {
        let url = self.url_for(expression);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::LegacyApi(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!("Legacy API answered {} for {}", status, url);
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::LegacyApi(format!("Invalid JSON from {}: {}", url, e)))?;
        Ok(Some(body))
    }
}

#[cfg(test)]
#[path = "legacy_api_tests.rs"]
mod tests;
