//! Storage collaborator contract.
//!
//! # Public Types
//!
//! - [`Table`]: typed table with uniqueness on `uri` and natural key
//! - [`Store`]: one table per entity kind
//! - [`MemoryStore`](memory::MemoryStore): in-memory reference implementation

pub mod memory;

use crate::error::Result;
use crate::model::{
    CollectionReference, Concept, EntityId, LocalizedText, Lookup, Mapping, Organization, Record,
    RepoKind, Repository, User,
};

/// A typed table of records.
///
/// Implementations must reject inserts and updates that would duplicate a
/// record's `uri` or natural key with [`Error::Conflict`](crate::Error::Conflict).
pub trait Table<R: Record>: Send + Sync {
    /// Inserts a new record, assigning its id.
    fn insert(&self, record: R) -> Result<R>;

    /// Inserts a record built from the id it is about to receive.
    ///
    /// Used when the URI or version label embeds the id.
    fn insert_with(&self, build: &mut dyn FnMut(EntityId) -> R) -> Result<R>;

    /// Gets a record by id.
    fn get(&self, id: EntityId) -> Option<R>;

    /// Finds a record by any indexed key.
    fn find(&self, lookup: &Lookup<'_>) -> Option<R>;

    /// Whether a record matches the lookup.
    fn exists(&self, lookup: &Lookup<'_>) -> bool {
        self.find(lookup).is_some()
    }

    /// Replaces a stored record (matched by id).
    fn update(&self, record: &R) -> Result<()>;

    /// Returns every record matching the predicate, in insertion order.
    fn filter(&self, predicate: &dyn Fn(&R) -> bool) -> Vec<R>;

    /// Returns records whose legacy id is in `ids`, in insertion order.
    fn find_by_internal_ids(&self, ids: &[String]) -> Vec<R> {
        self.filter(&|record: &R| {
            record
                .internal_reference_id()
                .is_some_and(|id| ids.iter().any(|wanted| wanted == id))
        })
    }

    /// Sets the legacy id of the record with the given uri.
    ///
    /// Returns `false` when no record has that uri.
    fn set_internal_reference_id(&self, uri: &str, internal_reference_id: &str) -> Result<bool>;

    /// Number of records.
    fn len(&self) -> usize;

    /// Whether the table is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The storage collaborator: one table per entity kind.
pub trait Store: Send + Sync {
    /// User accounts.
    fn users(&self) -> &dyn Table<User>;
    /// Organizations.
    fn organizations(&self) -> &dyn Table<Organization>;
    /// Sources (HEAD and versions).
    fn sources(&self) -> &dyn Table<Repository>;
    /// Collections (HEAD and versions).
    fn collections(&self) -> &dyn Table<Repository>;
    /// Concepts (identity rows and versions).
    fn concepts(&self) -> &dyn Table<Concept>;
    /// Mappings (identity rows and versions).
    fn mappings(&self) -> &dyn Table<Mapping>;
    /// Localized names and descriptions.
    fn localized_texts(&self) -> &dyn Table<LocalizedText>;
    /// Collection references.
    fn references(&self) -> &dyn Table<CollectionReference>;

    /// Sources or collections, by kind.
    fn repositories(&self, kind: RepoKind) -> &dyn Table<Repository> {
        match kind {
            RepoKind::Source => self.sources(),
            RepoKind::Collection => self.collections(),
        }
    }
}
