//! Error types for `termbase`.
//!
//! This module provides a unified error type for all storage and versioning
//! operations. Importers surface these messages verbatim in their failure
//! reports, so every variant carries a human-readable description.

use thiserror::Error;

/// Result type alias for `termbase` core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `termbase` core operations.
///
/// Error codes follow the pattern `TERM-XXX` for easy debugging.
#[derive(Error, Debug)]
pub enum Error {
    /// A record with the same natural key already exists (TERM-001).
    #[error("[TERM-001] {kind} with {key} '{value}' already exists")]
    Conflict {
        /// Entity kind (e.g. "concept").
        kind: &'static str,
        /// Name of the conflicting key (e.g. "uri").
        key: &'static str,
        /// Conflicting value.
        value: String,
    },

    /// Record not found (TERM-002).
    #[error("[TERM-002] {kind} '{key}' not found")]
    NotFound {
        /// Entity kind.
        kind: &'static str,
        /// Lookup key that missed.
        key: String,
    },

    /// Record failed validation (TERM-003).
    #[error("[TERM-003] Validation error: {0}")]
    Validation(String),

    /// Storage error (TERM-004).
    #[error("[TERM-004] Storage error: {0}")]
    Storage(String),

    /// IO error (TERM-005).
    #[error("[TERM-005] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (TERM-006).
    #[error("[TERM-006] Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns the error code (e.g., "TERM-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "TERM-001",
            Self::NotFound { .. } => "TERM-002",
            Self::Validation(_) => "TERM-003",
            Self::Storage(_) => "TERM-004",
            Self::Io(_) => "TERM-005",
            Self::Serialization(_) => "TERM-006",
        }
    }

    /// Returns true if the error only concerns a single record.
    ///
    /// Importers keep going after record-level errors; IO and storage
    /// failures usually mean the backend itself is unusable.
    #[must_use]
    pub const fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::NotFound { .. } | Self::Validation(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
