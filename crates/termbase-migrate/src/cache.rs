//! Per-run lookup caches.
//!
//! Each cache holds records by store id plus an alias index from every key
//! a record was (or could be) looked up by. A lookup that misses is
//! remembered too, so a run asks the store about a missing key only once.
//! Caches live for one importer run.

use rustc_hash::FxHashMap;

use termbase_core::{
    Concept, EntityId, Lookup, Mapping, Organization, Record, Repository, Table, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AliasKind {
    Uri,
    NaturalKey,
    InternalReferenceId,
}

type Alias = (AliasKind, String);

fn alias_of(lookup: &Lookup<'_>) -> Option<Alias> {
    match *lookup {
        Lookup::Id(_) => None,
        Lookup::Uri(uri) => Some((AliasKind::Uri, uri.to_string())),
        Lookup::NaturalKey(key) => Some((AliasKind::NaturalKey, key.to_string())),
        Lookup::InternalReferenceId(id) => Some((AliasKind::InternalReferenceId, id.to_string())),
    }
}

/// Lookup cache for one entity kind.
#[derive(Debug, Clone)]
pub struct LookupCache<R> {
    records: FxHashMap<EntityId, R>,
    aliases: FxHashMap<Alias, Option<EntityId>>,
    store_lookups: usize,
}

impl<R> Default for LookupCache<R> {
    fn default() -> Self {
        Self {
            records: FxHashMap::default(),
            aliases: FxHashMap::default(),
            store_lookups: 0,
        }
    }
}

impl<R: Record> LookupCache<R> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `lookup`, asking `table` only on the first request for a key.
    pub fn resolve(&mut self, table: &dyn Table<R>, lookup: Lookup<'_>) -> Option<R> {
        if let Lookup::Id(id) = lookup {
            if let Some(record) = self.records.get(&id) {
                return Some(record.clone());
            }
            self.store_lookups += 1;
            let found = table.get(id);
            if let Some(record) = &found {
                self.remember(record);
            }
            return found;
        }

        let alias = alias_of(&lookup)?;
        if let Some(cached) = self.aliases.get(&alias) {
            return cached.and_then(|id| self.records.get(&id).cloned());
        }

        self.store_lookups += 1;
        let found = table.find(&lookup);
        match &found {
            Some(record) => {
                self.remember(record);
                self.aliases.insert(alias, Some(record.id()));
            }
            None => {
                self.aliases.insert(alias, None);
            }
        }
        found
    }

    /// Caches a record under all of its keys, replacing any remembered miss.
    pub fn remember(&mut self, record: &R) {
        let id = record.id();
        if let Some(uri) = record.uri() {
            self.aliases.insert((AliasKind::Uri, uri.to_string()), Some(id));
        }
        if let Some(key) = record.natural_key() {
            self.aliases
                .insert((AliasKind::NaturalKey, key.to_string()), Some(id));
        }
        if let Some(legacy) = record.internal_reference_id() {
            self.aliases
                .insert((AliasKind::InternalReferenceId, legacy.to_string()), Some(id));
        }
        self.records.insert(id, record.clone());
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of lookups that reached the store.
    #[must_use]
    pub fn store_lookups(&self) -> usize {
        self.store_lookups
    }
}

/// The caches of one importer run.
#[derive(Debug, Clone, Default)]
pub struct Caches {
    /// Users.
    pub users: LookupCache<User>,
    /// Organizations.
    pub organizations: LookupCache<Organization>,
    /// Sources.
    pub sources: LookupCache<Repository>,
    /// Collections.
    pub collections: LookupCache<Repository>,
    /// Concepts.
    pub concepts: LookupCache<Concept>,
    /// Mappings.
    pub mappings: LookupCache<Mapping>,
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
