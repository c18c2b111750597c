//! # `termbase` Core
//!
//! Entity model and storage contract of a terminology service: users,
//! organizations, sources and collections (repositories with a mutable HEAD
//! and immutable versions), versioned concepts and mappings, localized texts
//! and collection references.
//!
//! ## Features
//!
//! - **Typed tables**: unique `uri` and natural keys enforced on insert
//! - **Memory store**: `parking_lot` guarded tables with JSON snapshots
//! - **Versioning**: latest-version bookkeeping and initial version synthesis
//! - **Search seam**: fire-and-forget index population over a channel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use termbase_core::{MemoryStore, Organization, Store, Lookup};
//!
//! let store = MemoryStore::new();
//! store.organizations().insert(Organization::new("CIEL"))?;
//!
//! let org = store.organizations().find(&Lookup::NaturalKey("CIEL"));
//! assert!(org.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]

pub mod error;
pub mod index;
pub mod model;
pub mod store;
pub mod uri;
pub mod versioning;

#[cfg(test)]
mod index_tests;

pub use error::{Error, Result};
pub use index::{BackgroundIndexer, IndexKind, IndexTask, MemoryIndexer, SearchIndexer};
pub use model::{
    Audit, CollectionReference, Concept, EntityId, LocalizedText, Lookup, Mapping, Organization,
    Owner, Record, RepoKind, Repository, User, Versioned, HEAD,
};
pub use store::memory::{MemoryStore, MemoryTable};
pub use store::{Store, Table};
pub use versioning::MappingCriteria;
