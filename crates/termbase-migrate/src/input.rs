//! Import input loading.
//!
//! Inputs are read fully into memory before the first record is processed,
//! so a missing file or an unreachable URL fails the run up front.

use indexmap::IndexMap;
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::http::{handle_http_error, is_http_url};

/// Maximum file size for local imports (1GB).
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Collection URI to ordered expression list, in document order.
pub type ReferenceDocument = IndexMap<String, Vec<String>>;

/// Reads a file path or an `http(s)://` URL into a string.
pub async fn read_location(location: &str, client: &Client) -> Result<String> {
    if is_http_url(location) {
        debug!("Fetching input from {}", location);
        let response = client
            .get(location)
            .send()
            .await
            .map_err(|e| Error::Input(format!("Failed to fetch {}: {}", location, e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(handle_http_error(status.as_u16(), &body, location));
        }
        return Ok(response.text().await?);
    }

    let path = location.strip_prefix("file://").unwrap_or(location);
    read_file(Path::new(path)).await
}

async fn read_file(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::Input(format!("Cannot read {}: {}", path.display(), e)))?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(Error::Input(format!(
            "File too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_FILE_SIZE
        )));
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Splits line-delimited JSON into its non-blank lines.
#[must_use]
pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a reference document: one object of collection URI to expression
/// list. Collections keep their document order.
pub fn parse_reference_document(content: &str) -> Result<ReferenceDocument> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| Error::MalformedInput(format!("Reference input is not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(Error::MalformedInput(
            "Reference input must be a JSON object".to_string(),
        ));
    }
    serde_json::from_str::<ReferenceDocument>(content).map_err(|e| {
        Error::MalformedInput(format!(
            "Reference input must map collection URIs to lists of expressions: {}",
            e
        ))
    })
}

/// Loads line-delimited records.
pub async fn load_lines(location: &str, client: &Client) -> Result<Vec<String>> {
    let lines = parse_lines(&read_location(location, client).await?);
    info!("Loaded {} records from {}", lines.len(), location);
    Ok(lines)
}

/// Loads a reference document.
pub async fn load_reference_document(location: &str, client: &Client) -> Result<ReferenceDocument> {
    let document = parse_reference_document(&read_location(location, client).await?)?;
    info!("Loaded {} collections from {}", document.len(), location);
    Ok(document)
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
