//! HTTP utilities shared by URL inputs and the legacy API client.

use reqwest::Client;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates a configured HTTP client with timeout.
#[must_use]
pub fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Whether a location names an HTTP resource rather than a file.
#[must_use]
pub fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Validates a URL for safety (anti-SSRF).
pub fn validate_url(url: &str) -> Result<()> {
    if !is_http_url(url) {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }

    // Basic URL format validation
    if url.len() < 10 {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }

    Ok(())
}

/// Maps a non-success HTTP response to an error.
pub fn handle_http_error(status_code: u16, body: &str, what: &str) -> Error {
    match status_code {
        404 => Error::Input(format!("{} not found", what)),
        401 | 403 => Error::Input(format!("{} access denied: {}", what, body)),
        _ => Error::Input(format!("{} error {}: {}", what, status_code, body)),
    }
}
