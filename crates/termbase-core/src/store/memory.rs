//! In-memory store with JSON snapshot persistence.
//!
//! Each table keeps rows in insertion order (`IndexMap`) behind a
//! `parking_lot::RwLock`, plus hash indexes on `uri`, natural key and legacy
//! id. Locks are never held across calls into other tables.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Store, Table};
use crate::error::{Error, Result};
use crate::model::{
    CollectionReference, Concept, EntityId, LocalizedText, Lookup, Mapping, Organization, Record,
    Repository, User,
};

/// Treats empty keys as absent.
fn non_empty(key: Option<&str>) -> Option<&str> {
    key.filter(|k| !k.is_empty())
}

#[derive(Debug)]
struct TableState<R> {
    rows: IndexMap<EntityId, R>,
    by_uri: FxHashMap<String, EntityId>,
    by_key: FxHashMap<String, EntityId>,
    by_internal_id: FxHashMap<String, EntityId>,
    next_id: EntityId,
}

impl<R: Record> TableState<R> {
    fn new() -> Self {
        Self {
            rows: IndexMap::new(),
            by_uri: FxHashMap::default(),
            by_key: FxHashMap::default(),
            by_internal_id: FxHashMap::default(),
            next_id: 1,
        }
    }

    fn check_unique(&self, record: &R, own_id: EntityId) -> Result<()> {
        if let Some(uri) = non_empty(record.uri()) {
            if self.by_uri.get(uri).is_some_and(|&id| id != own_id) {
                return Err(Error::Conflict {
                    kind: record.kind_name(),
                    key: "uri",
                    value: uri.to_string(),
                });
            }
        }
        if let Some(key) = non_empty(record.natural_key()) {
            if self.by_key.get(key).is_some_and(|&id| id != own_id) {
                return Err(Error::Conflict {
                    kind: record.kind_name(),
                    key: R::NATURAL_KEY,
                    value: key.to_string(),
                });
            }
        }
        Ok(())
    }

    fn index(&mut self, record: &R) {
        let id = record.id();
        if let Some(uri) = non_empty(record.uri()) {
            self.by_uri.insert(uri.to_string(), id);
        }
        if let Some(key) = non_empty(record.natural_key()) {
            self.by_key.insert(key.to_string(), id);
        }
        // First row imported with a legacy id wins.
        if let Some(legacy) = non_empty(record.internal_reference_id()) {
            self.by_internal_id.entry(legacy.to_string()).or_insert(id);
        }
    }

    fn unindex(&mut self, record: &R) {
        let id = record.id();
        if let Some(uri) = non_empty(record.uri()) {
            if self.by_uri.get(uri) == Some(&id) {
                self.by_uri.remove(uri);
            }
        }
        if let Some(key) = non_empty(record.natural_key()) {
            if self.by_key.get(key) == Some(&id) {
                self.by_key.remove(key);
            }
        }
        if let Some(legacy) = non_empty(record.internal_reference_id()) {
            if self.by_internal_id.get(legacy) == Some(&id) {
                self.by_internal_id.remove(legacy);
            }
        }
    }

    fn insert(&mut self, mut record: R) -> Result<R> {
        record.set_id(self.next_id);
        self.check_unique(&record, record.id())?;
        self.next_id += 1;
        self.index(&record);
        self.rows.insert(record.id(), record.clone());
        Ok(record)
    }

    fn replace(&mut self, record: &R) -> Result<()> {
        let id = record.id();
        let Some(previous) = self.rows.get(&id).cloned() else {
            return Err(Error::NotFound {
                kind: R::KIND,
                key: id.to_string(),
            });
        };
        self.check_unique(record, id)?;
        self.unindex(&previous);
        self.index(record);
        self.rows.insert(id, record.clone());
        Ok(())
    }

    fn find(&self, lookup: &Lookup<'_>) -> Option<&R> {
        let id = match lookup {
            Lookup::Id(id) => *id,
            Lookup::Uri(uri) => *self.by_uri.get(*uri)?,
            Lookup::NaturalKey(key) => *self.by_key.get(*key)?,
            Lookup::InternalReferenceId(legacy) => *self.by_internal_id.get(*legacy)?,
        };
        self.rows.get(&id)
    }
}

/// Serialized form of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot<R> {
    /// Next id to assign.
    pub next_id: EntityId,
    /// Rows in insertion order.
    pub rows: Vec<R>,
}

impl<R> Default for TableSnapshot<R> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

/// A thread-safe in-memory [`Table`].
#[derive(Debug)]
pub struct MemoryTable<R> {
    state: RwLock<TableState<R>>,
}

impl<R: Record> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> MemoryTable<R> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TableState::new()),
        }
    }

    /// Copies the table into its serialized form.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot<R> {
        let state = self.state.read();
        TableSnapshot {
            next_id: state.next_id,
            rows: state.rows.values().cloned().collect(),
        }
    }

    /// Rebuilds a table (and its indexes) from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the snapshot holds duplicate keys.
    pub fn from_snapshot(snapshot: TableSnapshot<R>) -> Result<Self> {
        let mut state = TableState::new();
        for record in snapshot.rows {
            state.check_unique(&record, record.id())?;
            state.index(&record);
            state.next_id = state.next_id.max(record.id() + 1);
            state.rows.insert(record.id(), record);
        }
        state.next_id = state.next_id.max(snapshot.next_id);
        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

impl<R: Record> Table<R> for MemoryTable<R> {
    fn insert(&self, record: R) -> Result<R> {
        self.state.write().insert(record)
    }

    fn insert_with(&self, build: &mut dyn FnMut(EntityId) -> R) -> Result<R> {
        let mut state = self.state.write();
        let record = build(state.next_id);
        state.insert(record)
    }

    fn get(&self, id: EntityId) -> Option<R> {
        self.state.read().rows.get(&id).cloned()
    }

    fn find(&self, lookup: &Lookup<'_>) -> Option<R> {
        self.state.read().find(lookup).cloned()
    }

    fn update(&self, record: &R) -> Result<()> {
        self.state.write().replace(record)
    }

    fn filter(&self, predicate: &dyn Fn(&R) -> bool) -> Vec<R> {
        self.state
            .read()
            .rows
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    fn set_internal_reference_id(&self, uri: &str, internal_reference_id: &str) -> Result<bool> {
        let mut state = self.state.write();
        let Some(mut record) = state.find(&Lookup::Uri(uri)).cloned() else {
            return Ok(false);
        };
        record.set_internal_reference_id(Some(internal_reference_id.to_string()));
        state.replace(&record)?;
        Ok(true)
    }

    fn len(&self) -> usize {
        self.state.read().rows.len()
    }
}

/// Serialized form of a whole [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    /// Users.
    pub users: TableSnapshot<User>,
    /// Organizations.
    pub organizations: TableSnapshot<Organization>,
    /// Sources.
    pub sources: TableSnapshot<Repository>,
    /// Collections.
    pub collections: TableSnapshot<Repository>,
    /// Concepts.
    pub concepts: TableSnapshot<Concept>,
    /// Mappings.
    pub mappings: TableSnapshot<Mapping>,
    /// Localized texts.
    pub localized_texts: TableSnapshot<LocalizedText>,
    /// Collection references.
    pub references: TableSnapshot<CollectionReference>,
}

/// In-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: MemoryTable<User>,
    organizations: MemoryTable<Organization>,
    sources: MemoryTable<Repository>,
    collections: MemoryTable<Repository>,
    concepts: MemoryTable<Concept>,
    mappings: MemoryTable<Mapping>,
    localized_texts: MemoryTable<LocalizedText>,
    references: MemoryTable<CollectionReference>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every table into a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            users: self.users.snapshot(),
            organizations: self.organizations.snapshot(),
            sources: self.sources.snapshot(),
            collections: self.collections.snapshot(),
            concepts: self.concepts.snapshot(),
            mappings: self.mappings.snapshot(),
            localized_texts: self.localized_texts.snapshot(),
            references: self.references.snapshot(),
        }
    }

    /// Rebuilds a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        Ok(Self {
            users: MemoryTable::from_snapshot(snapshot.users)?,
            organizations: MemoryTable::from_snapshot(snapshot.organizations)?,
            sources: MemoryTable::from_snapshot(snapshot.sources)?,
            collections: MemoryTable::from_snapshot(snapshot.collections)?,
            concepts: MemoryTable::from_snapshot(snapshot.concepts)?,
            mappings: MemoryTable::from_snapshot(snapshot.mappings)?,
            localized_texts: MemoryTable::from_snapshot(snapshot.localized_texts)?,
            references: MemoryTable::from_snapshot(snapshot.references)?,
        })
    }

    /// Opens a snapshot file, or returns an empty store if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No snapshot found, starting empty");
            return Ok(Self::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let snapshot: StoreSnapshot = serde_json::from_reader(reader)?;
        let store = Self::from_snapshot(snapshot)?;
        info!(path = %path.display(), "Loaded store snapshot");
        Ok(store)
    }

    /// Writes the store to a snapshot file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.snapshot())?;
        info!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }
}

impl Store for MemoryStore {
    fn users(&self) -> &dyn Table<User> {
        &self.users
    }

    fn organizations(&self) -> &dyn Table<Organization> {
        &self.organizations
    }

    fn sources(&self) -> &dyn Table<Repository> {
        &self.sources
    }

    fn collections(&self) -> &dyn Table<Repository> {
        &self.collections
    }

    fn concepts(&self) -> &dyn Table<Concept> {
        &self.concepts
    }

    fn mappings(&self) -> &dyn Table<Mapping> {
        &self.mappings
    }

    fn localized_texts(&self) -> &dyn Table<LocalizedText> {
        &self.localized_texts
    }

    fn references(&self) -> &dyn Table<CollectionReference> {
        &self.references
    }
}
