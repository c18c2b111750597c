// Import tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # termbase Legacy Importer
//!
//! `termbase-migrate` is a CLI tool and library for importing exports of a
//! legacy terminology service into a `termbase` store.
//!
//! ## Importers
//!
//! | Importer | Input | Buckets |
//! |----------|-------|---------|
//! | `orgs`, `sources`, `collections`, `concepts`, `mappings` | JSON lines | created, existed, failed |
//! | `*_versions` | JSON lines | created, existed, failed |
//! | `users` | JSON lines | created, updated, existed, failed |
//! | `*_ids` | JSON lines | updated, not_found, failed |
//! | `web_user_credential` | JSON lines | updated, not_found |
//! | `tokens` | JSON lines | updated, not_found, old_users |
//! | `collection_reference` | reference document | created, not_found, existed, not_found_references |
//! | `mapping_reference` | reference document | ... plus not_found_matching_mapping, failed |
//!
//! ## Quick Start
//!
//! ```bash
//! termbase-migrate import concepts ./exports/concepts.json --snapshot ./termbase.json
//!
//! termbase-migrate run --config import.yaml
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! importer: mapping_reference
//! input: ./exports/references.json
//!
//! store:
//!   snapshot: ./termbase.json
//!
//! legacy_api:
//!   environment: staging
//!   timeout_secs: 30
//!
//! options:
//!   drop_version_if_version_missing: true
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod importers;
pub mod input;
pub mod legacy;
pub mod legacy_api;
pub mod pipeline;
pub mod report;

pub use config::{Environment, ImportConfig, ImportOptions, LegacyApiConfig};
pub use error::{Error, RecordError, Result};
pub use importers::ImporterKind;
pub use legacy_api::{HttpLegacyApi, LegacyApi};
pub use pipeline::Pipeline;
pub use report::{Bucket, ImportReport};
