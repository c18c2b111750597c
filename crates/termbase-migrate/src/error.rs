//! Error types for termbase-migrate.
//!
//! [`Error`] aborts a whole run (unreadable input, bad configuration, a
//! broken store). [`RecordError`] only fails the record being imported and is
//! rendered into that record's `errors` field in the report.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for import runs.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an import run.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The input could not be loaded.
    #[error("Input error: {0}")]
    Input(String),

    /// The input was loaded but has the wrong shape.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No importer is registered under this name.
    #[error("Unknown importer '{0}'")]
    UnknownImporter(String),

    /// The legacy API answered with an error.
    #[error("Legacy API error: {0}")]
    LegacyApi(String),

    /// The store failed in a way that is not specific to one record.
    #[error(transparent)]
    Store(#[from] termbase_core::Error),
}

/// Errors that fail a single record.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The line is not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The line is valid JSON but not an object.
    #[error("Record is not a JSON object")]
    NotAnObject,

    /// A required field is absent or empty.
    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    /// A referenced record could not be resolved.
    #[error("{0} not found")]
    Unresolved(String),

    /// The store rejected the record.
    #[error(transparent)]
    Store(#[from] termbase_core::Error),
}

impl RecordError {
    /// Shorthand for [`RecordError::Unresolved`].
    pub fn unresolved(what: impl Into<String>) -> Self {
        Self::Unresolved(what.into())
    }

    /// Whether the run should stop instead of moving on to the next record.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(e) if !e.is_record_level())
    }

    /// Error messages as reported in the `errors` field.
    #[must_use]
    pub fn messages(&self) -> Value {
        Value::Array(vec![Value::String(self.to_string())])
    }
}

impl From<RecordError> for Error {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Store(e) => Self::Store(e),
            other => Self::Input(other.to_string()),
        }
    }
}
